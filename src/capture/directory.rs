//! File-drop frame source
//!
//! Replays image files (png, jpg, bmp) from a directory in file-name order.
//! An external camera daemon can drop snapshots into the directory. A file
//! is queued again whenever its modification time changes, so a daemon that
//! keeps overwriting one snapshot is followed as well as one that writes new
//! names. Only the newest [`MAX_PENDING`] files are kept in the queue.

use super::FrameSource;
use crate::error::{KioskError, Result};
use crate::types::Frame;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Upper bound on files waiting to be read; older ones are dropped first
pub const MAX_PENDING: usize = 32;

/// Reads of one file version before it is skipped until it changes
pub const MAX_READ_ATTEMPTS: u32 = 3;

/// Frame source backed by a directory of images
pub struct DirectorySource {
    dir: PathBuf,
    loop_frames: bool,
    open: bool,
    pending: VecDeque<PathBuf>,
    /// Modification time of the version last queued, per file still on disk
    seen: HashMap<PathBuf, SystemTime>,
    failures: HashMap<PathBuf, u32>,
    sequence: u64,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loop_frames: false,
            open: false,
            pending: VecDeque::new(),
            seen: HashMap::new(),
            failures: HashMap::new(),
            sequence: 0,
        }
    }

    /// Restart from the first file once the directory is exhausted
    pub fn looping(mut self, loop_frames: bool) -> Self {
        self.loop_frames = loop_frames;
        self
    }

    /// Files waiting to be read
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn list_images(dir: &Path) -> Result<Vec<(PathBuf, SystemTime)>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            let Ok(meta) = entry.metadata() else { continue };
            if meta.is_file() && is_image(&path) {
                files.push((path, meta.modified().unwrap_or(UNIX_EPOCH)));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Queue files that are new or changed since they were last queued
    fn rescan(&mut self) -> Result<()> {
        let files = Self::list_images(&self.dir)
            .map_err(|e| KioskError::ReadFailed(format!("rescan {:?}: {}", self.dir, e)))?;

        let present: HashSet<&PathBuf> = files.iter().map(|(p, _)| p).collect();
        self.seen.retain(|p, _| present.contains(p));
        self.failures.retain(|p, _| present.contains(p));

        for (path, modified) in &files {
            match self.seen.insert(path.clone(), *modified) {
                Some(previous) if previous == *modified => continue,
                Some(_) => {
                    self.failures.remove(path);
                }
                None => {}
            }
            if !self.pending.contains(path) {
                self.pending.push_back(path.clone());
            }
        }

        if self.pending.len() > MAX_PENDING {
            let dropped = self.pending.len() - MAX_PENDING;
            self.pending.drain(..dropped);
            tracing::debug!("Frame queue full, dropped {} older frames", dropped);
        }
        Ok(())
    }

    /// Record a failed read; the file is queued again on the next rescan
    /// until it has failed [`MAX_READ_ATTEMPTS`] times
    fn note_failure(&mut self, path: &Path) {
        let attempts = self.failures.entry(path.to_path_buf()).or_insert(0);
        *attempts += 1;
        if *attempts < MAX_READ_ATTEMPTS {
            self.seen.remove(path);
        } else {
            tracing::warn!(
                "Skipping {:?} after {} failed reads until it changes",
                path,
                attempts
            );
        }
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.seen.clear();
        self.failures.clear();
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for DirectorySource {
    fn name(&self) -> String {
        format!("directory {}", self.dir.display())
    }

    fn open(&mut self) -> Result<()> {
        if !self.dir.is_dir() {
            return Err(KioskError::DeviceUnavailable(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        self.reset();
        self.rescan()
            .map_err(|e| KioskError::DeviceUnavailable(e.to_string()))?;
        self.open = true;
        tracing::info!(
            "Opened frame directory {:?} ({} frames queued)",
            self.dir,
            self.pending.len()
        );
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            return Err(KioskError::ReadFailed("source is not open".to_string()));
        }

        if self.pending.is_empty() {
            self.rescan()?;
            if self.pending.is_empty() && self.loop_frames && !self.seen.is_empty() {
                self.seen.clear();
                self.rescan()?;
            }
        }

        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        match image::open(&path) {
            Ok(image) => {
                self.failures.remove(&path);
                self.sequence += 1;
                Ok(Some(Frame::new(self.sequence, image.to_luma8())))
            }
            Err(e) => {
                self.note_failure(&path);
                Err(KioskError::ReadFailed(format!("{}: {}", path.display(), e)))
            }
        }
    }

    fn close(&mut self) {
        if self.open {
            tracing::info!("Closed frame directory {:?}", self.dir);
        }
        self.open = false;
        self.reset();
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
