//! Writing metadata back to its source
//!
//! A node's resolved data cannot be written back directly because it
//! mixes inherited and authored attributes. [`Tree::modify`] instead
//! edits the raw mapping of the nearest source file: the closest
//! ancestor holding raw data, descending through virtual-hierarchy
//! keys created on demand.

use crate::node::Tree;
use crate::value::{Map, Value};
use crate::yaml;
use crate::{Error, Result};

impl Tree {
    /// Edit the raw data behind a node and persist the change.
    ///
    /// The edit applies to the source file only; already-loaded node
    /// data is left untouched, reload the tree to observe the change.
    pub fn modify<F>(&mut self, name: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Map),
    {
        if self.find(name).is_none() {
            return Err(Error::ReferenceNotFound(name.to_string()));
        }
        let segments: Vec<String> = name
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(String::from)
            .collect();

        // Deepest node on the way down holding raw file data.
        let mut anchor_depth = None;
        let mut node = self.root();
        if node.raw_data().is_some() {
            anchor_depth = Some(0);
        }
        for (depth, segment) in segments.iter().enumerate() {
            node = node
                .child(segment)
                .ok_or_else(|| Error::ReferenceNotFound(name.to_string()))?;
            if node.raw_data().is_some() {
                anchor_depth = Some(depth + 1);
            }
        }
        let Some(anchor_depth) = anchor_depth else {
            return Err(Error::format(
                "No raw data found, does the tree grow on a filesystem?",
            ));
        };

        let mut anchor = self.root_mut();
        for segment in &segments[..anchor_depth] {
            anchor = anchor
                .child_mut(segment)
                .ok_or_else(|| Error::ReferenceNotFound(name.to_string()))?;
        }
        let source = anchor
            .last_source()
            .cloned()
            .ok_or_else(|| Error::format("No source file to write back to."))?;

        let mut raw = anchor.raw_data().cloned().unwrap_or_default();
        {
            let mut cursor = &mut raw;
            for segment in &segments[anchor_depth..] {
                let entry = cursor
                    .entry(format!("/{segment}"))
                    .or_insert_with(|| Value::Mapping(Map::new()));
                if entry.is_null() {
                    *entry = Value::Mapping(Map::new());
                }
                cursor = entry.as_mapping_mut().ok_or_else(|| {
                    Error::format(format!(
                        "Cannot descend into virtual key '/{segment}', not a mapping."
                    ))
                })?;
            }
            edit(cursor);
        }

        stratum_fs::io::write_atomic(&source, yaml::dump_map(&raw)?.as_bytes())?;
        tracing::debug!(node = name, source = %source.display(), "Raw data written back");
        anchor.set_raw_data(raw);
        Ok(())
    }
}
