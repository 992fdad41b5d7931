use crate::params::{BOUNDED_EPOCH, SHUFFLE};
use crate::{Params, Pipeline, PipelineError, Result, Tuple, ViewId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

const CACHE_VERSION: u32 = 1;

#[derive(Serialize)]
struct CacheFileRef<'a> {
    version: u32,
    tuples: &'a [Tuple],
}

#[derive(Deserialize)]
struct CacheFile {
    version: u32,
    tuples: Vec<Tuple>,
}

/// Replay state of a cached view
#[derive(Debug, Clone)]
pub(crate) struct Replay {
    tuples: Arc<Vec<Tuple>>,
    cursor: usize,
    /// Set after the last tuple of a bounded pass; the next request reports it.
    pass_complete: bool,
}

impl Replay {
    pub(crate) fn new(tuples: Vec<Tuple>) -> Self {
        Self {
            tuples: Arc::new(tuples),
            cursor: 0,
            pass_complete: false,
        }
    }

    /// Shares the cached tuples until one side reshuffles.
    pub(crate) fn fork(&self) -> Self {
        Self {
            tuples: Arc::clone(&self.tuples),
            cursor: self.cursor,
            pass_complete: false,
        }
    }

    pub(crate) fn next(&mut self, params: &Params, rng: &mut StdRng) -> Result<Tuple> {
        if self.pass_complete {
            self.pass_complete = false;
            return Err(PipelineError::EpochExhausted);
        }
        if self.cursor == 0 && params.flag(SHUFFLE) {
            Arc::make_mut(&mut self.tuples).shuffle(rng);
        }

        let tuple = self
            .tuples
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| PipelineError::Cache("replay cache is empty".to_string()))?;
        self.cursor = (self.cursor + 1) % self.tuples.len();

        if self.cursor == 0 && params.flag(BOUNDED_EPOCH) {
            self.pass_complete = true;
        }
        Ok(tuple)
    }
}

/// Write `tuples` to `path`, replacing any existing file.
pub fn persist(path: &Path, tuples: &[Tuple]) -> Result<()> {
    if tuples.is_empty() {
        return Err(PipelineError::Cache("nothing to cache".to_string()));
    }
    if !tuples.iter().flatten().all(|value| value.is_finite()) {
        return Err(PipelineError::Cache(
            "non-finite numbers cannot be cached".to_string(),
        ));
    }

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(
        &mut writer,
        &CacheFileRef {
            version: CACHE_VERSION,
            tuples,
        },
    )?;
    writer.flush()?;
    Ok(())
}

/// Read a cache written by [`persist`].
pub fn load(path: &Path) -> Result<Vec<Tuple>> {
    let reader = BufReader::new(File::open(path)?);
    let corrupt = |reason: String| PipelineError::CacheCorruption {
        path: path.to_path_buf(),
        reason,
    };

    let file: CacheFile = serde_json::from_reader(reader).map_err(|e| corrupt(e.to_string()))?;
    if file.version != CACHE_VERSION {
        return Err(corrupt(format!("unsupported version {}", file.version)));
    }
    let Some(width) = file.tuples.first().map(Vec::len) else {
        return Err(corrupt("no tuples".to_string()));
    };
    if let Some(pos) = file.tuples.iter().position(|t| t.len() != width) {
        return Err(corrupt(format!(
            "tuple {} has {} values, expected {}",
            pos,
            file.tuples[pos].len(),
            width
        )));
    }
    Ok(file.tuples)
}

impl Pipeline {
    /// Every tuple `view` produces in one full pass.
    ///
    /// Pulls a clone of the subgraph with `bounded_epoch` set until it reports
    /// `EpochExhausted`. Never returns if no source in the subgraph ends a pass.
    pub fn drain(&mut self, view: ViewId) -> Result<Vec<Tuple>> {
        let bounded = Params::new().with(BOUNDED_EPOCH, true);
        let clones = self.clone_subgraph(view, &bounded)?;

        let mut tuples = Vec::new();
        let mut outcome = Ok(());
        if let Some(&root) = clones.get(&view) {
            loop {
                match self.request(root, None) {
                    Ok(tuple) => tuples.push(tuple),
                    Err(PipelineError::EpochExhausted) => break,
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                }
            }
        }
        self.remove_views(clones.into_values());

        outcome?;
        tracing::debug!("Drained {} tuples from {}", tuples.len(), view);
        Ok(tuples)
    }

    /// Switch `view` to replaying a cache stored at `path`.
    ///
    /// When nothing is stored there yet, the view is drained once and the
    /// result persisted first. Later calls with the same path only load.
    /// Returns the number of cached tuples.
    ///
    /// While replaying, the view's `shuffle` parameter reshuffles the cache at
    /// the start of every pass and `bounded_epoch` makes the view report
    /// `EpochExhausted` once after each pass.
    pub fn cache_or_load(&mut self, view: ViewId, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        self.node(view)?;

        if !path.is_file() {
            let tuples = self.drain(view)?;
            persist(path, &tuples)?;
            tracing::info!("Cached {} elements to {}", tuples.len(), path.display());
        }

        let tuples = load(path)?;
        let count = tuples.len();
        let node = self.node_mut(view)?;
        node.replay = Some(Replay::new(tuples));
        node.production = None;

        tracing::info!("Loaded {} elements in cache", count);
        Ok(count)
    }
}
