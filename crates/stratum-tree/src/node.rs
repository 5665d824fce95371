//! Tree nodes, directory growth, inheritance and adjustment
//!
//! A [`Tree`] owns a root [`Node`]; every node exclusively owns its
//! children, keyed by path segment. Construction grows the node
//! structure from metadata files, then a single top-down inheritance
//! pass merges parent data into children with the suffix operators.
//! [`Node::adjust`] applies context rules afterwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use stratum_context::{Context, ContextError, Rule, parse_rule};

use crate::value::{Map, Value};
use crate::{Error, IGNORED_DIRECTORIES, MAIN, Result, SUFFIX, VERSION, merge, yaml};

/// Directory traversal switches for [`Tree::from_path_with`].
///
/// Hidden (dot-prefixed) entries and symlinked metadata files are
/// skipped by default. Symlinked directories are always followed, with
/// cycle protection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeOptions {
    pub include_hidden: bool,
    pub follow_links: bool,
}

/// Policy for rules the context cannot decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Undecided {
    /// Silently move on to the next rule.
    #[default]
    Skip,
    /// Propagate the undecidable condition to the caller.
    Raise,
}

/// Outcome reported to the adjust decision callback, once per rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Matched,
    NotMatched,
    Undecided,
}

/// Parameters of [`Node::adjust`].
#[derive(Debug, Clone)]
pub struct AdjustOptions {
    /// Attribute holding the node's own rules.
    pub key: String,
    pub undecided: Undecided,
    /// Applied to the whole pass via the context.
    pub case_sensitive: bool,
    /// Additional rules applied after each node's own, as an
    /// independent rule set.
    pub extra_rules: Option<Value>,
}

impl Default for AdjustOptions {
    fn default() -> Self {
        Self {
            key: "adjust".to_string(),
            undecided: Undecided::Skip,
            case_sensitive: true,
            extra_rules: None,
        }
    }
}

type Callback<'a> = &'a mut dyn FnMut(&str, &Map, Decision);

/// Node selection parameters for [`Node::prune`].
#[derive(Default)]
pub struct PruneOptions<'a> {
    /// Include every node, not just selected ones.
    pub whole: bool,
    /// Attributes that must be present.
    pub keys: Vec<String>,
    /// Node name patterns, any match qualifies.
    pub names: Vec<String>,
    /// Source files, any membership qualifies.
    pub sources: Vec<PathBuf>,
    /// Filter expressions, all must match.
    pub filters: Vec<String>,
    /// Arbitrary final check.
    pub predicate: Option<&'a dyn Fn(&Node) -> bool>,
}

/// Symlink targets already entered during one growth pass.
#[derive(Debug, Default)]
struct GrowState {
    symlinks: Vec<PathBuf>,
}

/// Recognized control flags from the reserved `/` key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Directives {
    inherit: Option<bool>,
    select: Option<bool>,
}

/// One point in the metadata hierarchy.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    data: Map,
    original_data: Map,
    raw_data: Option<Map>,
    sources: Vec<PathBuf>,
    directives: Directives,
    updated: bool,
    children: BTreeMap<String, Node>,
}

/// A whole metadata tree and its origin.
#[derive(Debug, Clone)]
pub struct Tree {
    root_dir: Option<PathBuf>,
    version: u32,
    root: Node,
    commit: OnceLock<Option<String>>,
}

fn join_name(parent: &str, segment: &str) -> String {
    if parent == "/" {
        format!("/{segment}")
    } else {
        format!("{parent}/{segment}")
    }
}

impl Node {
    fn new(name: String) -> Self {
        Self {
            name,
            data: Map::new(),
            original_data: Map::new(),
            raw_data: None,
            sources: Vec::new(),
            directives: Directives::default(),
            updated: false,
            children: BTreeMap::new(),
        }
    }

    /// Absolute slash-path from the tree root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved attributes after inheritance and adjustment.
    pub fn data(&self) -> &Map {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Map {
        &mut self.data
    }

    /// Attributes as authored, before the parent merge.
    pub fn original_data(&self) -> &Map {
        &self.original_data
    }

    /// Files contributing to this node, parent sources first.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub(crate) fn raw_data(&self) -> Option<&Map> {
        match &self.raw_data {
            Some(map) if !map.is_empty() => Some(map),
            _ => None,
        }
    }

    pub(crate) fn set_raw_data(&mut self, raw: Map) {
        self.raw_data = Some(raw);
    }

    pub(crate) fn last_source(&self) -> Option<&PathBuf> {
        self.sources.last()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn child(&self, segment: &str) -> Option<&Node> {
        self.children.get(segment)
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.values()
    }

    pub(crate) fn child_mut(&mut self, segment: &str) -> Option<&mut Node> {
        self.children.get_mut(segment)
    }

    /// Merge a mapping into this node.
    ///
    /// Marks the node updated even for absent input, which is how an
    /// intentionally empty file differs from a never-populated
    /// placeholder. Keys starting with `/` create or update children,
    /// a deeper path like `/a/b` being split one segment at a time.
    pub fn update(&mut self, data: Option<&Map>) -> Result<()> {
        self.updated = true;
        let Some(data) = data else {
            return Ok(());
        };
        if let Some(directives) = data.get("/") {
            self.process_directives(directives)?;
        }
        for (key, value) in data {
            if key == "/" {
                continue;
            }
            let Some(name) = key.strip_prefix('/') else {
                self.data.insert(key.clone(), value.clone());
                continue;
            };
            match name.split_once('/') {
                Some((segment, rest)) => {
                    let mut wrapped = Map::new();
                    wrapped.insert(format!("/{rest}"), value.clone());
                    self.child_update(segment, Some(&wrapped))?;
                }
                None => match value {
                    Value::Mapping(map) => self.child_update(name, Some(map))?,
                    Value::Null => self.child_update(name, None)?,
                    other => {
                        return Err(Error::format(format!(
                            "Child '{key}' of '{}' must be a mapping or null, got {}.",
                            self.name,
                            other.type_name()
                        )));
                    }
                },
            }
        }
        tracing::debug!(node = %self.name, "Data updated");
        Ok(())
    }

    fn process_directives(&mut self, value: &Value) -> Result<()> {
        let Value::Mapping(map) = value else {
            return Err(Error::format(format!(
                "Directives in '{}' must be a mapping.",
                self.name
            )));
        };
        for (key, value) in map {
            match (key.as_str(), value) {
                ("inherit", Value::Bool(flag)) => self.directives.inherit = Some(*flag),
                ("select", Value::Bool(flag)) => self.directives.select = Some(*flag),
                ("inherit" | "select", other) => {
                    return Err(Error::format(format!(
                        "Directive '{key}' in '{}' must be a boolean, got {}.",
                        self.name,
                        other.type_name()
                    )));
                }
                _ => {
                    return Err(Error::format(format!(
                        "Unknown directive '{key}' in '{}'.",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn child_update(&mut self, segment: &str, data: Option<&Map>) -> Result<()> {
        let name = join_name(&self.name, segment);
        let child = self
            .children
            .entry(segment.to_string())
            .or_insert_with(|| Node::new(name));
        child.update(data)
    }

    fn child_from_file(&mut self, segment: &str, data: Option<&Map>, source: PathBuf) -> Result<()> {
        let name = join_name(&self.name, segment);
        let child = self
            .children
            .entry(segment.to_string())
            .or_insert_with(|| Node::new(name));
        child.update(data)?;
        child.sources.push(source);
        child.raw_data = Some(data.cloned().unwrap_or_default());
        Ok(())
    }

    /// Populate a whole subtree from a directory.
    fn grow(&mut self, path: &Path, options: &TreeOptions, state: &mut GrowState) -> Result<()> {
        if IGNORED_DIRECTORIES.iter().any(|ignored| path == Path::new(ignored)) {
            return Ok(());
        }
        let entries = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "Skipping unreadable directory");
                return Ok(());
            }
        };

        let mut files = Vec::new();
        let mut directories = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if !options.include_hidden && name.starts_with('.') {
                continue;
            }
            let Ok(file_type) = entry.file_type() else { continue };
            let is_symlink = file_type.is_symlink();
            let is_dir = if is_symlink {
                entry.path().is_dir()
            } else {
                file_type.is_dir()
            };
            if is_dir {
                directories.push((name, is_symlink));
            } else if name.ends_with(SUFFIX) {
                if is_symlink && !options.follow_links {
                    tracing::debug!(path = %entry.path().display(), "Ignoring symlinked file");
                    continue;
                }
                files.push(name);
            }
        }
        files.sort();
        directories.sort();

        // The node's own file first, named children after.
        if let Some(position) = files.iter().position(|file| file == MAIN) {
            let main = files.remove(position);
            files.insert(0, main);
        }

        for file in files {
            let full = path.join(&file);
            let content = stratum_fs::io::read_text(&full)?;
            let data = yaml::load_map(&content)
                .map_err(|error| Error::file(&full, error))?;
            tracing::debug!(path = %full.display(), "Metadata file loaded");
            if file == MAIN {
                self.raw_data = Some(data.clone().unwrap_or_default());
                self.sources.push(full);
                self.update(data.as_ref())?;
            } else {
                let segment = file.strip_suffix(SUFFIX).unwrap_or(&file).to_string();
                self.child_from_file(&segment, data.as_ref(), full)?;
            }
        }

        for (directory, is_symlink) in directories {
            let full = path.join(&directory);
            if is_symlink {
                let Ok(target) = std::fs::canonicalize(&full) else {
                    continue;
                };
                if state.symlinks.contains(&target) {
                    tracing::debug!(path = %full.display(), "Breaking symlink cycle");
                    continue;
                }
                state.symlinks.push(target);
            }
            if full.join(SUFFIX).is_dir() {
                tracing::debug!(path = %full.display(), "Ignoring nested tree");
                continue;
            }
            let name = join_name(&self.name, &directory);
            let child = self
                .children
                .entry(directory)
                .or_insert_with(|| Node::new(name));
            child.grow(&full, options, state)?;
        }

        // Directories that contributed no metadata leave no trace.
        self.children.retain(|segment, child| {
            let keep = child.updated || !child.children.is_empty();
            if !keep {
                tracing::debug!(node = %join_name(&self.name, segment), "Removing empty node");
            }
            keep
        });
        Ok(())
    }

    /// Top-down inheritance over the whole subtree, run once after
    /// growth. Children always merge against already-inherited data.
    fn inherit(&mut self) -> Result<()> {
        self.original_data = self.data.clone();
        let Self { data, sources, children, .. } = self;
        for child in children.values_mut() {
            child.inherit_from(data, sources)?;
        }
        Ok(())
    }

    fn inherit_from(&mut self, parent_data: &Map, parent_sources: &[PathBuf]) -> Result<()> {
        self.original_data = self.data.clone();
        if self.directives.inherit != Some(false) {
            let mut merged = parent_data.clone();
            merge::merge_special(&mut merged, &self.data, &self.name)?;
            self.data = merged;
            let mut sources = parent_sources.to_vec();
            sources.append(&mut self.sources);
            self.sources = sources;
            tracing::debug!(node = %self.name, "Inherited parent data");
        }
        let Self { data, sources, children, .. } = self;
        for child in children.values_mut() {
            child.inherit_from(data, sources)?;
        }
        Ok(())
    }

    /// Apply context rules to this subtree.
    pub fn adjust(&mut self, context: &Context, options: &AdjustOptions) -> Result<()> {
        let mut context = context.clone();
        context.case_sensitive = options.case_sensitive;
        self.adjust_inner(&context, options, &mut None)
    }

    /// Same as [`Node::adjust`] with a decision callback invoked once
    /// per inspected rule with the node name, the raw rule body and
    /// the decision.
    pub fn adjust_with(
        &mut self,
        context: &Context,
        options: &AdjustOptions,
        callback: Callback<'_>,
    ) -> Result<()> {
        let mut context = context.clone();
        context.case_sensitive = options.case_sensitive;
        self.adjust_inner(&context, options, &mut Some(callback))
    }

    fn adjust_inner(
        &mut self,
        context: &Context,
        options: &AdjustOptions,
        callback: &mut Option<Callback<'_>>,
    ) -> Result<()> {
        if let Some(own) = self.data.get(&options.key).cloned() {
            let rules = normalize_rules(&own, &self.name)?;
            self.apply_rule_set(&rules, context, options, callback)?;
        }
        if let Some(extra) = &options.extra_rules {
            let rules = normalize_rules(extra, &self.name)?;
            self.apply_rule_set(&rules, context, options, callback)?;
        }
        for child in self.children.values_mut() {
            child.adjust_inner(context, options, callback)?;
        }
        Ok(())
    }

    /// One independent rule set. A non-continuing match stops this set
    /// only.
    fn apply_rule_set(
        &mut self,
        rules: &[Map],
        context: &Context,
        options: &AdjustOptions,
        callback: &mut Option<Callback<'_>>,
    ) -> Result<()> {
        for rule in rules {
            let when = match rule.get("when") {
                None => Rule::always(true),
                Some(Value::Bool(value)) => Rule::always(*value),
                Some(Value::String(condition)) => parse_rule(condition)?,
                Some(other) => {
                    return Err(Error::format(format!(
                        "The 'when' condition in '{}' must be a string or boolean, got {}.",
                        self.name,
                        other.type_name()
                    )));
                }
            };
            let proceed = match rule.get("continue") {
                None => true,
                Some(Value::Bool(value)) => *value,
                Some(other) => {
                    return Err(Error::format(format!(
                        "The 'continue' flag in '{}' must be a boolean, got {}.",
                        self.name,
                        other.type_name()
                    )));
                }
            };
            match context.matches_rule(&when) {
                Ok(true) => {
                    if let Some(callback) = callback.as_mut() {
                        callback(&self.name, rule, Decision::Matched);
                    }
                    let mut patch = rule.clone();
                    patch.remove("when");
                    patch.remove("continue");
                    patch.remove("because");
                    merge::merge_special(&mut self.data, &patch, &self.name)?;
                    tracing::debug!(node = %self.name, "Rule applied");
                    if !proceed {
                        break;
                    }
                }
                Ok(false) => {
                    if let Some(callback) = callback.as_mut() {
                        callback(&self.name, rule, Decision::NotMatched);
                    }
                }
                Err(error @ ContextError::CannotDecide(_)) => {
                    if let Some(callback) = callback.as_mut() {
                        callback(&self.name, rule, Decision::Undecided);
                    }
                    if options.undecided == Undecided::Raise {
                        return Err(error.into());
                    }
                }
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }

    fn selected(&self) -> bool {
        match self.directives.select {
            Some(select) => select,
            None => self.children.is_empty(),
        }
    }

    /// All nodes of the subtree when `whole`, otherwise leaves plus
    /// nodes explicitly selected by directive, minus the deselected.
    pub fn climb(&self, whole: bool) -> Vec<&Node> {
        let mut nodes = Vec::new();
        self.collect(whole, &mut nodes);
        nodes
    }

    fn collect<'a>(&'a self, whole: bool, nodes: &mut Vec<&'a Node>) {
        if whole || self.selected() {
            nodes.push(self);
        }
        for child in self.children.values() {
            child.collect(whole, nodes);
        }
    }

    /// Look up a node of this subtree by its full name.
    pub fn find(&self, name: &str) -> Option<&Node> {
        self.descend(name)
    }

    pub(crate) fn find_mut(&mut self, name: &str) -> Option<&mut Node> {
        let segments = self.relative_segments(name)?;
        let mut node = self;
        for segment in segments {
            node = node.children.get_mut(&segment)?;
        }
        Some(node)
    }

    fn descend(&self, name: &str) -> Option<&Node> {
        let segments = self.relative_segments(name)?;
        let mut node = self;
        for segment in segments {
            node = node.children.get(&segment)?;
        }
        Some(node)
    }

    fn relative_segments(&self, name: &str) -> Option<Vec<String>> {
        if name == self.name {
            return Some(Vec::new());
        }
        let rest = name.strip_prefix(self.name.as_str())?;
        let rest = if self.name == "/" {
            rest
        } else {
            rest.strip_prefix('/')?
        };
        if rest.is_empty() {
            return Some(Vec::new());
        }
        Some(rest.split('/').map(String::from).collect())
    }

    /// Select and filter nodes of this subtree.
    ///
    /// A filter expression that cannot be evaluated against a node
    /// (missing attribute) drops the node rather than failing.
    pub fn prune(&self, options: &PruneOptions<'_>) -> Result<Vec<&Node>> {
        let names = options
            .names
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|error| Error::Filter(format!("Invalid name pattern: {error}")))
            })
            .collect::<Result<Vec<_>>>()?;
        let sources = options
            .sources
            .iter()
            .map(|source| {
                std::path::absolute(source)
                    .map_err(|error| Error::Filter(error.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut selected = Vec::new();
        'nodes: for node in self.climb(options.whole) {
            for key in &options.keys {
                if !node.data.contains_key(key) {
                    continue 'nodes;
                }
            }
            if !names.is_empty() && !names.iter().any(|regex| regex.is_match(&node.name)) {
                continue;
            }
            if !sources.is_empty()
                && !node.sources.iter().any(|source| sources.contains(source))
            {
                continue;
            }
            for expression in &options.filters {
                match crate::filter::filter(expression, &node.data, true, true) {
                    Ok(true) => {}
                    Ok(false) | Err(_) => continue 'nodes,
                }
            }
            if let Some(predicate) = options.predicate {
                if !predicate(node) {
                    continue;
                }
            }
            selected.push(node);
        }
        Ok(selected)
    }
}

impl Tree {
    /// Build a tree from a directory inside it.
    ///
    /// The tree root is detected by walking up to the marker
    /// directory; growth always starts from the root so the tree is
    /// complete no matter which subdirectory was given.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_path_with(path, TreeOptions::default())
    }

    pub fn from_path_with(path: impl AsRef<Path>, options: TreeOptions) -> Result<Self> {
        let given = path.as_ref();
        let path =
            std::path::absolute(given).map_err(|error| Error::file(given, error))?;
        if !path.is_dir() {
            return Err(Error::file(path, "Invalid directory path"));
        }
        let root_dir = find_root(&path)?;
        let version = read_version(&root_dir)?;
        tracing::debug!(root = %root_dir.display(), version, "Tree root detected");

        let mut root = Node::new("/".to_string());
        let mut state = GrowState::default();
        root.grow(&root_dir, &options, &mut state)?;
        root.inherit()?;
        Ok(Self {
            root_dir: Some(root_dir),
            version,
            root,
            commit: OnceLock::new(),
        })
    }

    /// Build an in-memory tree from a mapping.
    pub fn from_data(data: Map) -> Result<Self> {
        let mut root = Node::new("/".to_string());
        root.update(Some(&data))?;
        root.inherit()?;
        Ok(Self {
            root_dir: None,
            version: VERSION,
            root,
            commit: OnceLock::new(),
        })
    }

    /// Create the root marker for a fresh tree, returning its path.
    pub fn init(path: impl AsRef<Path>) -> Result<PathBuf> {
        let given = path.as_ref();
        let path =
            std::path::absolute(given).map_err(|error| Error::file(given, error))?;
        let marker = path.join(SUFFIX);
        if marker.exists() {
            return Err(Error::file(marker, "Tree root already exists"));
        }
        std::fs::create_dir_all(&marker).map_err(|error| Error::file(&marker, error))?;
        stratum_fs::io::write_text(&marker.join("version"), &format!("{VERSION}\n"))?;
        tracing::debug!(root = %path.display(), "Tree root initialized");
        Ok(path)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    /// Root directory, `None` for in-memory trees.
    pub fn root_dir(&self) -> Option<&Path> {
        self.root_dir.as_deref()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn find(&self, name: &str) -> Option<&Node> {
        self.root.find(name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.root.find_mut(name)
    }

    /// Apply context rules to the whole tree.
    pub fn adjust(&mut self, context: &Context, options: &AdjustOptions) -> Result<()> {
        self.root.adjust(context, options)
    }

    /// Head commit of the repository containing the tree root, if any.
    /// Detected once and cached.
    pub fn commit(&self) -> Option<&str> {
        let root_dir = self.root_dir.as_deref()?;
        self.commit
            .get_or_init(|| stratum_fs::fetch::head_commit(root_dir))
            .as_deref()
    }
}

fn find_root(path: &Path) -> Result<PathBuf> {
    let mut current = path.to_path_buf();
    loop {
        if current.join(SUFFIX).is_dir() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(Error::RootNotFound {
                path: path.to_path_buf(),
            });
        }
    }
}

fn read_version(root: &Path) -> Result<u32> {
    let file = root.join(SUFFIX).join("version");
    let text = stratum_fs::io::read_text(&file).map_err(|_| {
        Error::format(format!(
            "Unable to detect format version in '{}'.",
            file.display()
        ))
    })?;
    text.trim().parse().map_err(|_| {
        Error::format(format!("Invalid version format in '{}'.", file.display()))
    })
}

/// A rule attribute is one rule body or a list of them.
fn normalize_rules(value: &Value, node: &str) -> Result<Vec<Map>> {
    match value {
        Value::Mapping(rule) => Ok(vec![rule.clone()]),
        Value::Sequence(rules) => rules
            .iter()
            .map(|rule| match rule {
                Value::Mapping(rule) => Ok(rule.clone()),
                other => Err(Error::format(format!(
                    "Rules in '{node}' must be mappings, got {}.",
                    other.type_name()
                ))),
            })
            .collect(),
        other => Err(Error::format(format!(
            "Rules in '{node}' must be a mapping or a list of mappings, got {}.",
            other.type_name()
        ))),
    }
}
