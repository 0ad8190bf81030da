//! Module System for Carbide
//!
//! Orchestrates one analyzer across a dependency graph of modules: resolves
//! import specifiers, loads and analyzes each module exactly once, detects
//! import cycles, and harvests export tables. Cycles and missing exports are
//! hard load failures; everything type-level stays a diagnostic.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::frontend::ast::{Expr, ImportDecl, Program, Stmt};
use crate::frontend::lexer::Lexer;
use crate::frontend::parser::Parser;
use crate::frontend::semantic::{Analyzer, Symbol, SymbolTable};
use crate::types::Type;
use crate::utils::{Diagnostic, Error, Result};

/// A symbol exported by a module
#[derive(Debug, Clone)]
pub struct ExportedSymbol {
    pub name: String,
    pub ty: Type,
    pub mutable: bool,
    pub is_unsafe: bool,
    /// The module that originally defined the symbol; re-exports keep
    /// the original, not the re-exporting module
    pub source_module: String,
}

/// Export table of one loaded module
pub type ExportTable = HashMap<String, ExportedSymbol>;

/// Loads and analyzes a module graph with a single analyzer instance,
/// so diagnostics and trait registries span the whole compilation.
pub struct ModuleLoader {
    analyzer: Analyzer,
    /// Fully loaded modules, keyed by canonical path
    loaded: HashMap<PathBuf, ExportTable>,
    /// Modules whose load is in progress, for cycle detection
    in_progress: HashSet<PathBuf>,
    /// Current load chain, for cycle reporting
    stack: Vec<PathBuf>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self {
            analyzer: Analyzer::new(),
            loaded: HashMap::new(),
            in_progress: HashSet::new(),
            stack: Vec::new(),
        }
    }

    /// All diagnostics accumulated across every loaded module
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.analyzer.diagnostics()
    }

    /// Load, analyze, and compute the exports of the module at `path`.
    /// Each module is loaded exactly once; subsequent requests are served
    /// from the cache.
    pub fn load(&mut self, path: &Path) -> Result<&ExportTable> {
        let canonical = fs::canonicalize(path).map_err(|e| Error::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if self.loaded.contains_key(&canonical) {
            return Ok(&self.loaded[&canonical]);
        }

        // A module requested again while it is still loading means the
        // import graph has a cycle
        if self.in_progress.contains(&canonical) {
            let mut chain: Vec<String> = self
                .stack
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(canonical.display().to_string());
            return Err(Error::CyclicImport {
                chain: chain.join(" -> "),
            });
        }

        self.in_progress.insert(canonical.clone());
        self.stack.push(canonical.clone());
        let result = self.load_module(&canonical);
        self.stack.pop();
        // The marker is cleared on completion, success or failure
        self.in_progress.remove(&canonical);

        let exports = result?;
        self.loaded.insert(canonical.clone(), exports);
        Ok(&self.loaded[&canonical])
    }

    fn load_module(&mut self, path: &PathBuf) -> Result<ExportTable> {
        debug!("loading module {}", path.display());

        let source = fs::read_to_string(path).map_err(|e| Error::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut parser = Parser::new(Lexer::new(&source))?;
        let mut program = parser.parse_program()?;
        let module_name = path.display().to_string();

        // Dependencies load first so the import scope can be populated
        // with their exported symbols' types
        let mut imports = SymbolTable::with_builtins();
        for decl in Self::import_decls(&program) {
            let dep_path = self.resolve_specifier(&decl.specifier, path)?;
            let dep_exports = self.load(&dep_path)?.clone();
            for name in &decl.names {
                let Some(exported) = dep_exports.get(name) else {
                    return Err(Error::ExportNotFound {
                        name: name.clone(),
                        module: dep_path.display().to_string(),
                    });
                };
                imports.define(Symbol {
                    name: name.clone(),
                    ty: exported.ty.clone(),
                    mutable: exported.mutable,
                    line: decl.span.line,
                    source_module: Some(exported.source_module.clone()),
                    is_unsafe: exported.is_unsafe,
                });
            }
        }

        self.analyzer.analyze(&mut program, Some(imports), &module_name);

        // Read exported declarations' resolved types back out of the
        // populated scope
        let mut exports = ExportTable::new();
        for stmt in &program.statements {
            let Stmt::Export { inner, .. } = stmt else {
                continue;
            };
            for name in Self::declared_names(inner) {
                let Some(symbol) = self.analyzer.scope().resolve(&name) else {
                    return Err(Error::ExportNotFound {
                        name,
                        module: module_name.clone(),
                    });
                };
                exports.insert(
                    name.clone(),
                    ExportedSymbol {
                        name: name.clone(),
                        ty: symbol.ty.clone(),
                        mutable: symbol.mutable,
                        is_unsafe: symbol.is_unsafe,
                        source_module: symbol
                            .source_module
                            .clone()
                            .unwrap_or_else(|| module_name.clone()),
                    },
                );
            }
        }

        debug!(
            "module {} analyzed: {} exports",
            module_name,
            exports.len()
        );
        Ok(exports)
    }

    /// Import declarations of a program, including re-exported ones
    fn import_decls(program: &Program) -> Vec<&ImportDecl> {
        fn collect<'a>(stmt: &'a Stmt, out: &mut Vec<&'a ImportDecl>) {
            match stmt {
                Stmt::Import(decl) => out.push(decl),
                Stmt::Export { inner, .. } => collect(inner, out),
                _ => {}
            }
        }
        let mut decls = Vec::new();
        for stmt in &program.statements {
            collect(stmt, &mut decls);
        }
        decls
    }

    /// Names a statement defines in module scope, for export harvesting
    fn declared_names(stmt: &Stmt) -> Vec<String> {
        match stmt {
            Stmt::Let(decl) => vec![decl.name.clone()],
            Stmt::Expression { expr: Expr::Function(f), .. } => {
                f.name.iter().cloned().collect()
            }
            Stmt::StructDef(def) => vec![def.name.clone()],
            Stmt::EnumDef(def) => vec![def.name.clone()],
            Stmt::Extern(decl) => vec![decl.name.clone()],
            // `export import { x } from "m"` re-exports the imported names
            Stmt::Import(decl) => decl.names.clone(),
            Stmt::Export { inner, .. } => Self::declared_names(inner),
            _ => Vec::new(),
        }
    }

    /// Resolve an import specifier relative to the importing module
    fn resolve_specifier(&self, specifier: &str, importer: &Path) -> Result<PathBuf> {
        let dir = importer.parent().unwrap_or_else(|| Path::new("."));
        let mut candidate = dir.join(specifier);
        if candidate.extension().is_none() {
            candidate.set_extension("cb");
        }
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(Error::ModuleNotFound {
                spec: specifier.to_string(),
                importer: importer.display().to_string(),
            })
        }
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_module(dir: &TempDir, name: &str, source: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, source).expect("write module");
        path
    }

    #[test]
    fn imports_resolve_across_modules() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "util.cb",
            "export fn double(x: int) -> int { return x * 2; }\nexport let base = 10;",
        );
        let main = write_module(
            &dir,
            "main.cb",
            r#"import { double, base } from "./util";
let result = double(base) + 1;"#,
        );

        let mut loader = ModuleLoader::new();
        loader.load(&main).expect("load main");
        assert!(loader.diagnostics().is_empty());
    }

    #[test]
    fn module_loaded_exactly_once_in_diamond() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "shared.cb", "export let value = 1;");
        write_module(
            &dir,
            "left.cb",
            "import { value } from \"./shared\";\nexport let left = value + 1;",
        );
        write_module(
            &dir,
            "right.cb",
            "import { value } from \"./shared\";\nexport let right = value + 2;",
        );
        let main = write_module(
            &dir,
            "main.cb",
            "import { left } from \"./left\";\nimport { right } from \"./right\";\nlet total = left + right;",
        );

        let mut loader = ModuleLoader::new();
        loader.load(&main).expect("load main");
        assert!(loader.diagnostics().is_empty());
        // shared, left, right, main
        assert_eq!(loader.loaded.len(), 4);
    }

    #[test]
    fn import_cycle_is_a_hard_failure() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "a.cb",
            "import { b } from \"./b\";\nexport let a = 1;",
        );
        write_module(
            &dir,
            "b.cb",
            "import { a } from \"./a\";\nexport let b = 2;",
        );
        let entry = dir.path().join("a.cb");

        let mut loader = ModuleLoader::new();
        let result = loader.load(&entry);
        assert!(matches!(result, Err(Error::CyclicImport { .. })));
    }

    #[test]
    fn transitive_cycle_is_detected() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "a.cb", "import { c } from \"./b\";\nexport let a = 1;");
        write_module(&dir, "b.cb", "import { a } from \"./c\";\nexport let c = 2;");
        write_module(&dir, "c.cb", "import { a } from \"./a\";\nexport let a = 3;");
        let entry = dir.path().join("a.cb");

        let mut loader = ModuleLoader::new();
        let result = loader.load(&entry);
        assert!(matches!(result, Err(Error::CyclicImport { .. })));
    }

    #[test]
    fn missing_export_is_a_hard_failure() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "util.cb", "export let known = 1;");
        let main = write_module(
            &dir,
            "main.cb",
            "import { unknown } from \"./util\";\nlet x = unknown;",
        );

        let mut loader = ModuleLoader::new();
        let result = loader.load(&main);
        match result {
            Err(Error::ExportNotFound { name, .. }) => assert_eq!(name, "unknown"),
            other => panic!("expected ExportNotFound, got {:?}", other),
        }
    }

    #[test]
    fn reexport_keeps_original_defining_module() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "origin.cb", "export let answer = 42;");
        let middle = write_module(
            &dir,
            "middle.cb",
            "export import { answer } from \"./origin\";",
        );

        let mut loader = ModuleLoader::new();
        let exports = loader.load(&middle).expect("load middle").clone();
        let answer = exports.get("answer").expect("answer re-exported");
        assert!(
            answer.source_module.ends_with("origin.cb"),
            "source module should be the original definer, got {}",
            answer.source_module
        );
        assert_eq!(answer.ty, Type::INT);
    }

    #[test]
    fn imported_symbols_keep_their_types() {
        let dir = TempDir::new().unwrap();
        write_module(
            &dir,
            "shapes.cb",
            "export fn area(w: int, h: int) -> int { return w * h; }",
        );
        let main = write_module(
            &dir,
            "main.cb",
            r#"import { area } from "./shapes";
let bad: string = area(2, 3);"#,
        );

        let mut loader = ModuleLoader::new();
        loader.load(&main).expect("load main");
        // The imported function's int return flows into the annotation check
        let diags = loader.diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("Type mismatch"));
    }
}
