//! One-call save and load of a root object, from bytes or from a file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::diagnostics::LoadReport;
use crate::document::WriteOptions;
use crate::error::{Result, ScribeError};
use crate::reader::Reader;
use crate::slot::Exposable;
use crate::writer::Writer;

/// A value rebuilt by [`Archive::load`], with the diagnostics of its load.
#[derive(Debug)]
pub struct Loaded<T> {
    /// The reconstructed root object.
    pub value: T,
    /// Non-fatal issues found while loading.
    pub report: LoadReport,
}

/// One-call save and load of a single root object.
///
/// The root is stored as a deep object under `label`, directly below the
/// document root. Each call runs a complete session.
#[derive(Debug)]
pub struct Archive;

impl Archive {
    /// Saves `root` under `label` and returns the encoded document.
    pub fn save_bytes<T: Exposable>(label: &str, root: &mut T) -> Result<Vec<u8>> {
        Self::save_bytes_with(label, root, WriteOptions::default())
    }

    /// Like [`save_bytes`](Self::save_bytes), with explicit output options.
    pub fn save_bytes_with<T: Exposable>(
        label: &str,
        root: &mut T,
        options: WriteOptions,
    ) -> Result<Vec<u8>> {
        let mut writer = Writer::begin_with(options)?;
        writer.scribe().node(label, |s| root.expose(s))?;
        writer.finish()
    }

    /// Saves `root` under `label` to a file, replacing it if it exists.
    ///
    /// # Arguments
    /// * `path`: Destination file path.
    /// * `label`: Node name of the root object.
    /// * `root`: The root of the object graph.
    pub fn save<T, P>(path: P, label: &str, root: &mut T) -> Result<()>
    where
        T: Exposable,
        P: AsRef<Path>,
    {
        let bytes = Self::save_bytes(label, root)?;
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        out.write_all(&bytes)?;
        out.flush()?;
        log::debug!("saved {} bytes to {}", bytes.len(), path.as_ref().display());
        Ok(())
    }

    /// Loads the object stored under `label` from encoded bytes.
    ///
    /// A document without a `label` node is a [`ScribeError::Format`].
    pub fn load_bytes<T>(bytes: &[u8], label: &str) -> Result<Loaded<T>>
    where
        T: Exposable + Default,
    {
        let reader = Reader::start(bytes)?;
        if reader.document().root().child(label).is_none() {
            return Err(ScribeError::Format(format!("document has no `{label}` node")));
        }
        let mut value = T::default();
        let report = reader.finish(|s| s.look_deep(&mut value, label))?;
        Ok(Loaded { value, report })
    }

    /// Loads the object stored under `label` from a file.
    pub fn load<T, P>(path: P, label: &str) -> Result<Loaded<T>>
    where
        T: Exposable + Default,
        P: AsRef<Path>,
    {
        let file = File::open(path.as_ref())?;
        if file.metadata()?.len() == 0 {
            return Err(ScribeError::Format(format!(
                "{} is empty",
                path.as_ref().display()
            )));
        }

        // Safety: the map is only read for the duration of this call. Another
        // process truncating the file meanwhile is outside what we can guard.
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(&file)? };
        Self::load_bytes(&map, label)
    }
}
