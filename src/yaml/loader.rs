//! YAML loading with reference resolution.
//!
//! # Responsibilities
//! - Parse a document and resolve its reference tags into [`Value`]s
//! - Generate `!scs-gen-secret` values and persist them into the file
//! - Detect reference cycles and unaddressable (dotted) keys
//! - Consult the shared [`FileCache`] before parsing
//!
//! # Design Decisions
//! - Secret generation happens under a per-file lock, before any reference
//!   is followed, so no lock is held across files
//! - Every reference target is canonicalized, so one file has one cache key

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use regex::Regex;

use super::cache::FileCache;
use super::secrets::serialize_secrets;
use super::tags::{FileReference, ReferenceTag, TagKind};
use super::value::{Mapping, Secret, Value};
use super::LoadError;

/// Value used for secret references when running in placeholder mode.
pub const PLACEHOLDER_SECRET: &str = "DUMMY_REFERENCED_SECRET";

/// The role of a file, which decides the tags it may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// `scs-configuration.yaml`
    AppConfig,
    /// `scs-users.yaml`
    Users,
    /// `*scs-env.yaml` override files
    Environment,
    /// Files under the common directory
    Common,
    /// Files under the secrets directory
    Secret,
}

impl FileKind {
    pub fn allows(self, tag: TagKind) -> bool {
        use TagKind::*;
        match self {
            FileKind::AppConfig => matches!(tag, ExpandEnv),
            FileKind::Users => matches!(tag, Secret | ExpandEnv),
            FileKind::Environment | FileKind::Common => {
                matches!(tag, Secret | Common | Relative | ExpandEnv)
            }
            FileKind::Secret => matches!(tag, Secret | Relative | ExpandEnv | GenerateSecret),
        }
    }
}

/// How `!scs-secret` references are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretMode {
    /// Read the referenced secrets file.
    #[default]
    Resolve,
    /// Substitute a fixed placeholder, for validating configuration
    /// repositories that do not contain the secrets.
    Placeholder,
}

/// Source of environment variables for `!scs-expand-env`.
pub trait VarSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads variables from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl VarSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl VarSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Loader settings.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Base directory of `!scs-common` references.
    pub common_dir: PathBuf,
    /// Base directory of `!scs-secret` references.
    pub secrets_dir: Option<PathBuf>,
    /// Reject referenced files with dots in their key names.
    pub reject_dotted_keys: bool,
    pub secret_mode: SecretMode,
}

/// Result of loading one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub value: Value,
    /// True if secrets were generated and the file was rewritten.
    pub changed: bool,
}

/// Loads YAML files and resolves their reference tags.
pub struct YamlLoader {
    options: LoaderOptions,
    cache: Arc<FileCache>,
    vars: Arc<dyn VarSource>,
    write_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for YamlLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YamlLoader")
            .field("options", &self.options)
            .field("cached_files", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl YamlLoader {
    pub fn new(options: LoaderOptions, cache: Arc<FileCache>) -> Self {
        Self::with_vars(options, cache, Arc::new(ProcessEnv))
    }

    pub fn with_vars(options: LoaderOptions, cache: Arc<FileCache>, vars: Arc<dyn VarSource>) -> Self {
        Self {
            options,
            cache,
            vars,
            write_locks: DashMap::new(),
        }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<FileCache> {
        &self.cache
    }

    /// Loads `path` as a file of the given kind.
    pub fn load(&self, path: &Path, kind: FileKind) -> Result<Loaded, LoadError> {
        let mut stack = Vec::new();
        self.load_file(path, kind, &mut stack)
    }

    fn load_file(
        &self,
        path: &Path,
        kind: FileKind,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Loaded, LoadError> {
        let path = fs::canonicalize(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if stack.contains(&path) {
            let chain = stack
                .iter()
                .chain(std::iter::once(&path))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(LoadError::reference(
                path.display().to_string(),
                format!("cyclic reference: {chain}"),
            ));
        }

        if let Some(value) = self.cache.get(kind, &path) {
            return Ok(Loaded { value, changed: false });
        }

        let (document, changed) = self.read_document(&path, kind)?;

        stack.push(path.clone());
        let resolved = self.resolve_node(document, &path, kind, stack);
        stack.pop();
        let value = resolved?;

        self.cache.insert(kind, &path, &value);
        Ok(Loaded { value, changed })
    }

    /// Parses the file and materializes generated secrets.
    ///
    /// Runs under the file's write lock when the kind allows generated
    /// secrets, so two concurrent first loads cannot both generate a value.
    fn read_document(
        &self,
        path: &Path,
        kind: FileKind,
    ) -> Result<(serde_yaml::Value, bool), LoadError> {
        let generates = kind.allows(TagKind::GenerateSecret);
        let lock = generates.then(|| self.write_lock(path));
        let _guard = lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));

        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut document = if text.trim().is_empty() {
            serde_yaml::Value::Null
        } else {
            serde_yaml::from_str(&text).map_err(|source| LoadError::Syntax {
                path: path.to_path_buf(),
                source,
            })?
        };

        let changed = generates && materialize_generated_secrets(&mut document) > 0;
        if changed {
            let text = serde_yaml::to_string(&document).map_err(|e| LoadError::InvalidDocument {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            fs::write(path, text).map_err(|source| LoadError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!(path = %path.display(), "Generated secrets persisted");
        }

        Ok((document, changed))
    }

    fn write_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    fn resolve_node(
        &self,
        node: serde_yaml::Value,
        current: &Path,
        kind: FileKind,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Value, LoadError> {
        use serde_yaml::Value as Yaml;

        Ok(match node {
            Yaml::Null => Value::Null,
            Yaml::Bool(b) => Value::Bool(b),
            Yaml::Number(n) => Value::Number(n),
            Yaml::String(s) => Value::String(s),
            Yaml::Sequence(items) => Value::Sequence(
                items
                    .into_iter()
                    .map(|item| self.resolve_node(item, current, kind, stack))
                    .collect::<Result<_, _>>()?,
            ),
            Yaml::Mapping(map) => {
                let mut resolved = Mapping::new();
                for (key, value) in map {
                    let key = mapping_key(key, current)?;
                    resolved.insert(key, self.resolve_node(value, current, kind, stack)?);
                }
                Value::Mapping(resolved)
            }
            Yaml::Tagged(tagged) => {
                let name = tagged.tag.to_string();
                let tag_kind = TagKind::from_name(&name)
                    .filter(|tag| kind.allows(*tag))
                    .ok_or_else(|| LoadError::UnknownTag {
                        tag: name.clone(),
                        path: current.to_path_buf(),
                    })?;
                let raw = match tagged.value {
                    Yaml::String(s) => s,
                    Yaml::Null if tag_kind == TagKind::GenerateSecret => String::new(),
                    other => {
                        return Err(LoadError::InvalidDocument {
                            path: current.to_path_buf(),
                            reason: format!("tag {name} expects a string, got {other:?}"),
                        })
                    }
                };
                let tag = ReferenceTag::parse(tag_kind, &raw)?;
                self.resolve_tag(tag, current, kind, stack)?
            }
        })
    }

    fn resolve_tag(
        &self,
        tag: ReferenceTag,
        current: &Path,
        kind: FileKind,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Value, LoadError> {
        match tag {
            ReferenceTag::Secret(reference) => {
                if self.options.secret_mode == SecretMode::Placeholder {
                    return Ok(Value::Secret(Secret::new(
                        reference.raw,
                        Value::from(PLACEHOLDER_SECRET),
                    )));
                }
                let secrets_dir = self.options.secrets_dir.as_deref().ok_or_else(|| {
                    LoadError::reference(&reference.raw, "no secrets directory is configured")
                })?;
                let value = self.resolve_reference(secrets_dir, &reference, FileKind::Secret, stack)?;
                Ok(match value {
                    secret @ Value::Secret(_) => secret,
                    mut value => {
                        // Markers nested in a secret file are covered by the
                        // outer reference.
                        serialize_secrets(&mut value);
                        Value::Secret(Secret::new(reference.raw, value))
                    }
                })
            }
            ReferenceTag::Common(reference) => {
                self.resolve_reference(&self.options.common_dir, &reference, FileKind::Common, stack)
            }
            ReferenceTag::Relative(reference) => {
                let base = current.parent().unwrap_or_else(|| Path::new("/"));
                self.resolve_reference(base, &reference, kind, stack)
            }
            ReferenceTag::ExpandEnv(template) => {
                expand_env(&template, self.vars.as_ref(), current).map(Value::String)
            }
            ReferenceTag::GenerateSecret => Err(LoadError::InvalidDocument {
                path: current.to_path_buf(),
                reason: "generated secret was not materialized".to_string(),
            }),
        }
    }

    fn resolve_reference(
        &self,
        base: &Path,
        reference: &FileReference,
        kind: FileKind,
        stack: &mut Vec<PathBuf>,
    ) -> Result<Value, LoadError> {
        let target = base.join(&reference.file);
        if !target.is_file() {
            return Err(LoadError::reference(
                &reference.raw,
                format!("file {} not found", target.display()),
            ));
        }

        let loaded = self.load_file(&target, kind, stack)?;

        if self.options.reject_dotted_keys && loaded.value.contains_dotted_key() {
            return Err(LoadError::InvalidKey { path: target });
        }

        match &reference.attribute {
            None => Ok(loaded.value),
            Some(attribute) => attribute
                .resolve(&loaded.value)
                .cloned()
                .map_err(|reason| {
                    LoadError::reference(
                        &reference.raw,
                        format!("{reason} in {}", target.display()),
                    )
                }),
        }
    }
}

fn mapping_key(key: serde_yaml::Value, path: &Path) -> Result<String, LoadError> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        other => Err(LoadError::InvalidDocument {
            path: path.to_path_buf(),
            reason: format!("unsupported mapping key {other:?}"),
        }),
    }
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}{]+)\}").expect("valid env regex"))
}

/// Replaces `${NAME}` placeholders with variables from `vars`.
pub fn expand_env(template: &str, vars: &dyn VarSource, path: &Path) -> Result<String, LoadError> {
    let mut expanded = String::with_capacity(template.len());
    let mut last = 0;
    for captures in env_pattern().captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value = vars.var(name.as_str()).ok_or_else(|| LoadError::MissingEnvVar {
            name: name.as_str().to_string(),
            path: path.to_path_buf(),
        })?;
        expanded.push_str(&template[last..whole.start()]);
        expanded.push_str(&value);
        last = whole.end();
    }
    expanded.push_str(&template[last..]);
    Ok(expanded)
}

/// Generates a URL-safe token from 32 to 64 random bytes.
pub fn generate_secret() -> String {
    let len = rand::thread_rng().gen_range(32..=64);
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Replaces every `!scs-gen-secret` node with a generated token. Returns the
/// number of generated values.
fn materialize_generated_secrets(node: &mut serde_yaml::Value) -> usize {
    use serde_yaml::Value as Yaml;

    let generated = matches!(
        node,
        Yaml::Tagged(tagged)
            if TagKind::from_name(&tagged.tag.to_string()) == Some(TagKind::GenerateSecret)
    );
    if generated {
        *node = Yaml::String(generate_secret());
        return 1;
    }

    match node {
        Yaml::Tagged(tagged) => materialize_generated_secrets(&mut tagged.value),
        Yaml::Sequence(items) => items.iter_mut().map(materialize_generated_secrets).sum(),
        Yaml::Mapping(map) => map.values_mut().map(materialize_generated_secrets).sum(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            for sub in ["config", "common", "secrets"] {
                fs::create_dir_all(dir.path().join(sub)).unwrap();
            }
            Self { dir }
        }

        fn write(&self, rel: &str, contents: &str) -> PathBuf {
            let path = self.dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, contents).unwrap();
            path
        }

        fn options(&self) -> LoaderOptions {
            LoaderOptions {
                common_dir: self.dir.path().join("common"),
                secrets_dir: Some(self.dir.path().join("secrets")),
                reject_dotted_keys: true,
                secret_mode: SecretMode::Resolve,
            }
        }

        fn loader(&self) -> YamlLoader {
            YamlLoader::new(self.options(), Arc::new(FileCache::new(true)))
        }
    }

    fn get<'a>(value: &'a Value, key: &str) -> &'a Value {
        value.as_mapping().unwrap().get(key).unwrap()
    }

    #[test]
    fn test_common_reference_with_attribute_path() {
        let fx = Fixture::new();
        fx.write("common/other.yaml", "a: {b: [42, 43]}\n");
        let env = fx.write("config/scs-env.yaml", "key: !scs-common other.yaml#a.b[0]\n");

        let loaded = fx.loader().load(&env, FileKind::Environment).unwrap();
        assert_eq!(get(&loaded.value, "key"), &Value::from(42));
        assert!(!loaded.changed);
    }

    #[test]
    fn test_secret_reference_is_wrapped() {
        let fx = Fixture::new();
        fx.write("secrets/db.yaml", "password: hunter2\n");
        let env = fx.write("config/scs-env.yaml", "pw: !scs-secret db.yaml#password\n");

        let loaded = fx.loader().load(&env, FileKind::Environment).unwrap();
        assert_eq!(
            get(&loaded.value, "pw"),
            &Value::Secret(Secret::new("db.yaml#password", Value::from("hunter2")))
        );
    }

    #[test]
    fn test_secret_pointing_at_secret_not_double_wrapped() {
        let fx = Fixture::new();
        fx.write("secrets/real.yaml", "token: abc\n");
        fx.write("secrets/alias.yaml", "token: !scs-secret real.yaml#token\n");
        let env = fx.write("config/scs-env.yaml", "t: !scs-secret alias.yaml#token\n");

        let loaded = fx.loader().load(&env, FileKind::Environment).unwrap();
        assert_eq!(
            get(&loaded.value, "t"),
            &Value::Secret(Secret::new("real.yaml#token", Value::from("abc")))
        );
    }

    #[test]
    fn test_relative_reference() {
        let fx = Fixture::new();
        fx.write("config/app/shared.yaml", "port: 9200\n");
        let env = fx.write("config/app/scs-env.yaml", "p: !scs-relative shared.yaml#port\n");

        let loaded = fx.loader().load(&env, FileKind::Environment).unwrap();
        assert_eq!(get(&loaded.value, "p"), &Value::from(9200));
    }

    #[test]
    fn test_missing_attribute_is_reference_error() {
        let fx = Fixture::new();
        fx.write("common/other.yaml", "a: 1\n");
        let env = fx.write("config/scs-env.yaml", "key: !scs-common other.yaml#a.b\n");

        let err = fx.loader().load(&env, FileKind::Environment).unwrap_err();
        assert!(matches!(err, LoadError::Reference { .. }), "{err}");
        assert!(!err.is_syntax());
    }

    #[test]
    fn test_missing_file_is_reference_error() {
        let fx = Fixture::new();
        let env = fx.write("config/scs-env.yaml", "key: !scs-common nope.yaml\n");

        let err = fx.loader().load(&env, FileKind::Environment).unwrap_err();
        assert!(matches!(err, LoadError::Reference { .. }));
    }

    #[test]
    fn test_cycle_detected() {
        let fx = Fixture::new();
        fx.write("common/a.yaml", "x: !scs-common b.yaml\n");
        fx.write("common/b.yaml", "y: !scs-common a.yaml\n");
        let env = fx.write("config/scs-env.yaml", "key: !scs-common a.yaml\n");

        let err = fx.loader().load(&env, FileKind::Environment).unwrap_err();
        assert!(err.to_string().contains("cyclic"), "{err}");
    }

    #[test]
    fn test_dotted_keys_rejected_in_referenced_file() {
        let fx = Fixture::new();
        fx.write("common/es.yaml", "network.host: 127.0.0.1\n");
        let env = fx.write("config/scs-env.yaml", "key: !scs-common es.yaml\n");

        let err = fx.loader().load(&env, FileKind::Environment).unwrap_err();
        assert!(matches!(err, LoadError::InvalidKey { .. }));

        let mut options = fx.options();
        options.reject_dotted_keys = false;
        let loader = YamlLoader::new(options, Arc::new(FileCache::new(false)));
        assert!(loader.load(&env, FileKind::Environment).is_ok());
    }

    #[test]
    fn test_expand_env() {
        let fx = Fixture::new();
        let env = fx.write(
            "config/scs-env.yaml",
            "url: !scs-expand-env 'http://${HOST}:${PORT}/'\n",
        );
        let vars: HashMap<String, String> = [("HOST", "es"), ("PORT", "9200")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let loader = YamlLoader::with_vars(fx.options(), Arc::new(FileCache::new(true)), Arc::new(vars));

        let loaded = loader.load(&env, FileKind::Environment).unwrap();
        assert_eq!(get(&loaded.value, "url"), &Value::from("http://es:9200/"));
    }

    #[test]
    fn test_missing_env_var_is_fatal() {
        let fx = Fixture::new();
        let env = fx.write("config/scs-env.yaml", "url: !scs-expand-env '${NOT_SET}'\n");
        let loader = YamlLoader::with_vars(
            fx.options(),
            Arc::new(FileCache::new(true)),
            Arc::new(HashMap::new()),
        );

        let err = loader.load(&env, FileKind::Environment).unwrap_err();
        assert!(matches!(err, LoadError::MissingEnvVar { ref name, .. } if name == "NOT_SET"));
    }

    #[test]
    fn test_generated_secret_persisted_once() {
        let fx = Fixture::new();
        let secrets = fx.write("secrets/gen.yaml", "api_key: !scs-gen-secret\nfixed: value\n");
        let env = fx.write("config/scs-env.yaml", "key: !scs-secret gen.yaml#api_key\n");

        let loader = YamlLoader::new(fx.options(), Arc::new(FileCache::new(false)));
        let first = loader.load(&env, FileKind::Environment).unwrap();
        let second = loader.load(&env, FileKind::Environment).unwrap();
        assert_eq!(first.value, second.value);

        let rewritten = fs::read_to_string(&secrets).unwrap();
        assert!(!rewritten.contains("scs-gen-secret"));
        assert!(rewritten.contains("fixed: value"));

        let direct = loader.load(&secrets, FileKind::Secret).unwrap();
        assert!(!direct.changed);
        let token = get(&direct.value, "api_key").as_str().unwrap();
        assert!(token.len() >= 43, "token too short: {token}");
    }

    #[test]
    fn test_concurrent_first_loads_generate_one_secret() {
        let fx = Fixture::new();
        let secrets = fx.write("secrets/gen.yaml", "api_key: !scs-gen-secret\n");
        let loader = YamlLoader::new(fx.options(), Arc::new(FileCache::new(false)));
        let barrier = std::sync::Barrier::new(8);

        let results: Vec<Loaded> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        loader.load(&secrets, FileKind::Secret).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|loaded| loaded.changed).count(), 1);
        let tokens: BTreeSet<&str> = results
            .iter()
            .map(|loaded| get(&loaded.value, "api_key").as_str().unwrap())
            .collect();
        assert_eq!(tokens.len(), 1, "tokens: {tokens:?}");

        let on_disk: serde_yaml::Value =
            serde_yaml::from_str(&fs::read_to_string(&secrets).unwrap()).unwrap();
        assert_eq!(on_disk["api_key"].as_str(), tokens.into_iter().next());
    }

    #[test]
    fn test_direct_load_reports_change() {
        let fx = Fixture::new();
        let secrets = fx.write("secrets/gen.yaml", "a: !scs-gen-secret\n");
        let loaded = fx.loader().load(&secrets, FileKind::Secret).unwrap();
        assert!(loaded.changed);
    }

    #[test]
    fn test_tags_restricted_by_kind() {
        let fx = Fixture::new();
        let env = fx.write("config/scs-env.yaml", "a: !scs-gen-secret\n");
        let err = fx.loader().load(&env, FileKind::Environment).unwrap_err();
        assert!(matches!(err, LoadError::UnknownTag { .. }));

        let env = fx.write("config/x.scs-env.yaml", "a: !made-up thing\n");
        let err = fx.loader().load(&env, FileKind::Environment).unwrap_err();
        assert!(matches!(err, LoadError::UnknownTag { .. }));
    }

    #[test]
    fn test_syntax_error_is_distinct() {
        let fx = Fixture::new();
        let env = fx.write("config/scs-env.yaml", "a: [1, 2\n");
        let err = fx.loader().load(&env, FileKind::Environment).unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_placeholder_mode_skips_secrets_dir() {
        let fx = Fixture::new();
        let env = fx.write("config/scs-env.yaml", "pw: !scs-secret missing.yaml#pw\n");
        let mut options = fx.options();
        options.secret_mode = SecretMode::Placeholder;
        options.secrets_dir = None;
        let loader = YamlLoader::new(options, Arc::new(FileCache::new(true)));

        let mut loaded = loader.load(&env, FileKind::Environment).unwrap();
        let ids = serialize_secrets(&mut loaded.value);
        assert_eq!(ids, BTreeSet::from(["missing.yaml#pw".to_string()]));
        assert_eq!(get(&loaded.value, "pw"), &Value::from(PLACEHOLDER_SECRET));
    }

    #[test]
    fn test_cache_hit_is_independent() {
        let fx = Fixture::new();
        fx.write("secrets/db.yaml", "password: hunter2\n");
        let env = fx.write("config/scs-env.yaml", "pw: !scs-secret db.yaml#password\n");
        let loader = fx.loader();

        let mut first = loader.load(&env, FileKind::Environment).unwrap();
        serialize_secrets(&mut first.value);

        let mut second = loader.load(&env, FileKind::Environment).unwrap();
        assert_eq!(serialize_secrets(&mut second.value).len(), 1);
    }
}
