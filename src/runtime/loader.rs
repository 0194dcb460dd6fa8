use crate::runtime::cell::Procedure;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SOURCE_EXTENSION: &str = "saur";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("`{name}` was not found (searched {searched})")]
    NotFound { name: String, searched: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("package `{0}` is not available")]
    UnknownPackage(String),
}

#[derive(Clone, Debug)]
pub struct SourceModule {
    pub origin: String,
    pub text: String,
}

/// A named set of host procedures that `use` exposes as a box.
#[derive(Clone)]
pub struct NativePackage {
    pub name: String,
    pub procedures: Vec<(String, Procedure)>,
}

impl NativePackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            procedures: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, procedure: Procedure) -> Self {
        self.procedures.push((name.into(), procedure));
        self
    }
}

/// Where `import` finds source text and `use` finds native packages.
pub trait ModuleLoader: Send + Sync {
    fn resolve_source(&self, name: &str) -> Result<SourceModule, LoadError>;
    fn resolve_package(&self, name: &str) -> Result<NativePackage, LoadError>;
}

/// Resolves imports against the filesystem: the path as given first, then
/// each search root in order. Packages are whatever the host registered.
#[derive(Default)]
pub struct FileSystemLoader {
    roots: Vec<PathBuf>,
    packages: RwLock<HashMap<String, NativePackage>>,
}

impl FileSystemLoader {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            packages: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_package(&self, package: NativePackage) {
        tracing::debug!(package = %package.name, "registering native package");
        self.packages.write().insert(package.name.clone(), package);
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let requested = Path::new(name);
        let mut bases = vec![requested.to_path_buf()];
        if !requested.is_absolute() {
            bases.extend(self.roots.iter().map(|root| root.join(requested)));
        }
        let mut candidates = Vec::with_capacity(bases.len() * 2);
        for base in bases {
            let with_extension = base.extension().is_none().then(|| base.with_extension(SOURCE_EXTENSION));
            candidates.push(base);
            candidates.extend(with_extension);
        }
        candidates
    }
}

impl ModuleLoader for FileSystemLoader {
    fn resolve_source(&self, name: &str) -> Result<SourceModule, LoadError> {
        let candidates = self.candidates(name);
        for path in &candidates {
            if !path.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(path = %path.display(), "resolved source module");
            return Ok(SourceModule {
                origin: path.display().to_string(),
                text,
            });
        }
        let searched = candidates
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(LoadError::NotFound {
            name: name.to_string(),
            searched,
        })
    }

    fn resolve_package(&self, name: &str) -> Result<NativePackage, LoadError> {
        self.packages
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::UnknownPackage(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{
        cell::Cell,
        environment::Environment,
        error::RuntimeError,
        interpreter::{Flow, Interpreter},
    };
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn resolves_relative_names_against_search_roots() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("shapes.saur"), "[var sides 4]").expect("write module");
        let loader = FileSystemLoader::new(vec![dir.path().to_path_buf()]);

        let module = loader.resolve_source("shapes").expect("extension inferred");
        assert_eq!(module.text, "[var sides 4]");
        assert!(module.origin.ends_with("shapes.saur"));
        assert!(matches!(
            loader.resolve_source("missing"),
            Err(LoadError::NotFound { .. })
        ));
    }

    #[test]
    fn import_evaluates_into_the_current_scope() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("lib.saur"),
            "[var double [lambda [x] [* x 2]]]\n[var offset 1]\n",
        )
        .expect("write module");
        let interp = Interpreter::with_loader(Arc::new(FileSystemLoader::new(vec![dir
            .path()
            .to_path_buf()])));
        let env = Environment::new();
        let result = interp
            .run_source(None, "[import \"lib.saur\"]\n[+ [double 20] offset]", &env)
            .expect("run");
        assert_eq!(result.as_integer(), Some(41));

        let err = interp
            .run_source(None, "[import \"nowhere\"]", &env)
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Runtime { .. }));
    }

    #[test]
    fn use_binds_a_box_of_host_procedures() {
        let loader = Arc::new(FileSystemLoader::default());
        loader.register_package(NativePackage::new("math").with(
            "square",
            Procedure::new("square", |interp: &Interpreter, call, env| {
                call.expect_exactly(1)?;
                let value = interp.evaluate(&call.args[0], env)?;
                let n = value.as_integer().ok_or_else(|| call.error("square expects an integer"))?;
                Ok(Flow::Value(Cell::integer(n * n)))
            }),
        ));
        let interp = Interpreter::with_loader(loader);
        let env = Environment::new();
        let result = interp
            .run_source(None, "[use \"math\"]\n[use \"math\"]\n[math.square 7]", &env)
            .expect("run");
        assert_eq!(result.as_integer(), Some(49));
        assert!(env.package_loaded("math"));

        let err = interp.run_source(None, "[use \"net\"]", &env).unwrap_err();
        assert!(matches!(err, RuntimeError::Runtime { .. }));
    }
}
