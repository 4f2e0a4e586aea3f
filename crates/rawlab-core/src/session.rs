//! Editing session state: the selected sources, the current spec, per-file
//! overrides and which source the preview shows.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::adjust::{load_preset, save_preset, Adjustment, AdjustmentSpec, SpecOverrides};
use crate::batch::{BatchProcessor, Job, NamingRule};
use crate::config::Config;
use crate::discovery::FileDiscovery;
use crate::error::{AdjustError, Result};
use crate::export::ExportOptions;

/// State shared by the preview and batch sides of one editing session.
///
/// The session holds resolved values only. Nothing is persisted unless the
/// caller saves a preset.
#[derive(Debug, Clone)]
pub struct Session {
    config: Config,
    spec: AdjustmentSpec,
    overrides: HashMap<PathBuf, SpecOverrides>,
    sources: Vec<PathBuf>,
    preview_index: usize,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            spec: AdjustmentSpec::default(),
            overrides: HashMap::new(),
            sources: Vec::new(),
            preview_index: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Add source files, ignoring unsupported extensions and duplicates.
    /// Returns how many were added.
    pub fn add_sources<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut known: HashSet<PathBuf> = self.sources.iter().cloned().collect();
        let before = self.sources.len();
        for path in paths {
            let path = path.into();
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| self.config.is_supported_extension(e))
                .unwrap_or(false);
            if !supported {
                tracing::debug!("Ignoring unsupported source {:?}", path);
                continue;
            }
            if known.insert(path.clone()) {
                self.sources.push(path);
            }
        }
        self.sources.len() - before
    }

    /// Add every supported file found under `inputs` (files or directories).
    pub fn add_inputs<P: AsRef<Path>>(&mut self, inputs: &[P]) -> usize {
        let discovery = FileDiscovery::new(self.config.processing.clone());
        let found = discovery.discover_all(inputs);
        self.add_sources(found.into_iter().map(|f| f.path))
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn spec(&self) -> &AdjustmentSpec {
        &self.spec
    }

    pub fn set_spec(&mut self, spec: AdjustmentSpec) {
        self.spec = spec;
    }

    /// Set one parameter of the session-wide spec by name.
    pub fn set_value(&mut self, name: &str, value: f32) -> std::result::Result<(), AdjustError> {
        let adj = Adjustment::from_name(name)?;
        self.spec.set(adj, value)
    }

    /// Override one parameter for a single source.
    pub fn set_override(
        &mut self,
        source: &Path,
        adj: Adjustment,
        value: f32,
    ) -> std::result::Result<(), AdjustError> {
        self.overrides
            .entry(source.to_path_buf())
            .or_default()
            .set(adj, value)
    }

    pub fn clear_overrides(&mut self, source: &Path) {
        self.overrides.remove(source);
    }

    /// The session spec with `source`'s overrides applied.
    pub fn effective_spec(&self, source: &Path) -> AdjustmentSpec {
        match self.overrides.get(source) {
            Some(overrides) => self.spec.with_overrides(overrides),
            None => self.spec,
        }
    }

    /// Source currently shown in the preview.
    pub fn current_source(&self) -> Option<&Path> {
        self.sources.get(self.preview_index).map(PathBuf::as_path)
    }

    /// Advance the preview to the next source, wrapping at the end.
    pub fn next_source(&mut self) -> Option<&Path> {
        if self.sources.is_empty() {
            return None;
        }
        self.preview_index = (self.preview_index + 1) % self.sources.len();
        self.current_source()
    }

    pub fn previous_source(&mut self) -> Option<&Path> {
        if self.sources.is_empty() {
            return None;
        }
        let len = self.sources.len();
        self.preview_index = (self.preview_index + len - 1) % len;
        self.current_source()
    }

    /// Replace the session spec with a preset from disk.
    pub fn load_preset(&mut self, path: &Path) -> Result<()> {
        self.spec = load_preset(path)?;
        Ok(())
    }

    pub fn save_preset(&self, path: &Path) -> Result<()> {
        save_preset(path, &self.spec)
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions::from(&self.config.export)
    }

    /// One job per source, in source order, with its effective spec.
    pub fn build_jobs(&self) -> Result<Vec<Job>> {
        let naming = NamingRule::parse(&self.config.export.naming_template)?;
        let export = self.export_options();
        let output_dir = self.config.output_dir();
        Ok(self
            .sources
            .iter()
            .map(|source| {
                Job::new(source, self.effective_spec(source), &output_dir)
                    .with_naming(naming.clone())
                    .with_export(export.clone())
            })
            .collect())
    }

    /// A processor configured from the session config with every job queued.
    pub fn build_processor(&self) -> Result<BatchProcessor> {
        let mut processor = BatchProcessor::from_config(&self.config);
        for job in self.build_jobs()? {
            processor.enqueue(job);
        }
        Ok(processor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RawlabError;

    fn session_with(names: &[&str]) -> Session {
        let mut session = Session::new(Config::default());
        session.add_sources(names.iter().map(|n| PathBuf::from(format!("/shoot/{n}"))));
        session
    }

    #[test]
    fn test_add_sources_filters_and_dedupes() {
        let mut session = Session::new(Config::default());
        let added = session.add_sources(["/a/1.NEF", "/a/2.jpg", "/a/notes.txt", "/a/1.NEF"]);
        assert_eq!(added, 2);
        assert_eq!(session.sources().len(), 2);
    }

    #[test]
    fn test_add_inputs_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.tif"), b"x").unwrap();
        std::fs::write(dir.path().join("c.xmp"), b"x").unwrap();

        let mut session = Session::new(Config::default());
        assert_eq!(session.add_inputs(&[dir.path()]), 2);
        assert_eq!(session.current_source(), Some(dir.path().join("a.tif").as_path()));
    }

    #[test]
    fn test_next_and_previous_wrap() {
        let mut session = session_with(&["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(session.current_source(), Some(Path::new("/shoot/a.jpg")));
        session.next_source();
        assert_eq!(session.next_source(), Some(Path::new("/shoot/c.jpg")));
        assert_eq!(session.next_source(), Some(Path::new("/shoot/a.jpg")));
        assert_eq!(session.previous_source(), Some(Path::new("/shoot/c.jpg")));

        let mut empty = Session::new(Config::default());
        assert_eq!(empty.next_source(), None);
    }

    #[test]
    fn test_overrides_apply_per_source() {
        let mut session = session_with(&["a.jpg", "b.jpg"]);
        session.set_value("exposure", 1.0).unwrap();
        session
            .set_override(Path::new("/shoot/b.jpg"), Adjustment::Exposure, -0.5)
            .unwrap();

        let a = session.effective_spec(Path::new("/shoot/a.jpg"));
        let b = session.effective_spec(Path::new("/shoot/b.jpg"));
        assert_eq!(a.get(Adjustment::Exposure), 1.0);
        assert_eq!(b.get(Adjustment::Exposure), -0.5);

        session.clear_overrides(Path::new("/shoot/b.jpg"));
        assert_eq!(session.effective_spec(Path::new("/shoot/b.jpg")), a);
    }

    #[test]
    fn test_set_value_rejects_bad_input() {
        let mut session = Session::new(Config::default());
        assert!(matches!(
            session.set_value("grain", 10.0),
            Err(AdjustError::UnknownParameter(_))
        ));
        assert!(matches!(
            session.set_value("contrast", 500.0),
            Err(AdjustError::InvalidParameter { .. })
        ));
        assert!(session.spec().is_identity());
    }

    #[test]
    fn test_build_jobs_uses_config() {
        let mut config = Config::default();
        config.export.output_dir = PathBuf::from("/exports");
        config.export.naming_template = "{index}_{stem}".to_string();
        let mut session = Session::new(config);
        session.add_sources(["/shoot/a.jpg", "/shoot/b.jpg"]);
        session.set_value("saturation", 25.0).unwrap();

        let jobs = session.build_jobs().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].output_dir, PathBuf::from("/exports"));
        assert_eq!(jobs[1].naming.render_for(&jobs[1].source, 2), "0002_b");
        assert_eq!(jobs[0].spec.get(Adjustment::Saturation), 25.0);
        assert_eq!(session.build_processor().unwrap().pending(), 2);
    }

    #[test]
    fn test_build_jobs_rejects_bad_template() {
        let mut config = Config::default();
        config.export.naming_template = "{date}".to_string();
        let mut session = Session::new(config);
        session.add_sources(["/shoot/a.jpg"]);
        assert!(matches!(session.build_jobs(), Err(RawlabError::Naming(_))));
    }

    #[test]
    fn test_preset_round_trip_through_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("look.json");
        let mut session = Session::new(Config::default());
        session.set_value("clarity", 30.0).unwrap();
        session.save_preset(&path).unwrap();

        let mut other = Session::new(Config::default());
        other.load_preset(&path).unwrap();
        assert_eq!(other.spec(), session.spec());
    }
}
