use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use egui::Vec2;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::canvas::viewport::Viewport;
use crate::graph_utils::graph::{Connection, Frame, GraphStore, Node, NodeId};
use crate::workspace::state::WorkspaceState;

pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Live workspace autosave: cross-domain state plus the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceFile {
    pub state: WorkspaceState,
    pub pan: (f32, f32),
    pub zoom: f32,
}

impl WorkspaceFile {
    pub fn from_runtime(state: WorkspaceState, viewport: &Viewport) -> Self {
        Self { state, pan: (viewport.pan.x, viewport.pan.y), zoom: viewport.zoom() }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(Vec2::new(self.pan.0, self.pan.1), self.zoom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMeta {
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    pub version: String,
}

/// Standalone canvas export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceExport {
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
    pub frames: Vec<Frame>,
    pub meta: ExportMeta,
}

impl WorkspaceExport {
    pub fn from_graph(graph: &GraphStore, created: OffsetDateTime) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            connections: graph.connections().to_vec(),
            frames: graph.frames().to_vec(),
            meta: ExportMeta { created, version: EXPORT_FORMAT_VERSION.to_string() },
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        atomic_write(path, self.to_json()?.as_bytes())?;
        Ok(())
    }
}

// Export a subset of nodes as flat rows
pub fn export_nodes_csv(graph: &GraphStore, ids: &[NodeId], path: &Path) -> anyhow::Result<usize> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["id", "type", "x", "y", "locked", "title"])?;
    let mut written = 0;
    for id in ids {
        if let Some(n) = graph.node(*id) {
            wtr.write_record([
                n.id.to_string(),
                n.kind().as_str().to_string(),
                n.pos.x.to_string(),
                n.pos.y.to_string(),
                n.locked.to_string(),
                n.data.title().to_string(),
            ])?;
            written += 1;
        }
    }
    wtr.flush()?;
    Ok(written)
}

pub fn active_state_path(dir: &Path) -> PathBuf {
    dir.join("state.ron")
}

pub fn versioned_state_path_now(dir: &Path) -> PathBuf {
    let now = OffsetDateTime::now_utc();
    let fmt = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = now.format(fmt).unwrap_or_else(|_| "unknown".to_string());
    dir.join(format!("state_{}.ron", stamp))
}

pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(data)?;
        f.flush()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}

fn to_ron(file: &WorkspaceFile) -> anyhow::Result<String> {
    let pretty = PrettyConfig::new()
        .separate_tuple_members(true)
        .enumerate_arrays(true);
    Ok(ron::ser::to_string_pretty(file, pretty)?)
}

pub fn save_active(dir: &Path, file: &WorkspaceFile) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let s = to_ron(file)?;
    let path = active_state_path(dir);
    atomic_write(&path, s.as_bytes())?;
    Ok(path)
}

pub fn save_versioned(dir: &Path, file: &WorkspaceFile) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let s = to_ron(file)?;
    let path = versioned_state_path_now(dir);
    atomic_write(&path, s.as_bytes())?;
    Ok(path)
}

pub fn load_active(dir: &Path) -> anyhow::Result<Option<WorkspaceFile>> {
    let path = active_state_path(dir);
    if !path.exists() {
        return Ok(None);
    }
    load_from_path(&path).map(Some)
}

pub fn load_from_path(path: &Path) -> anyhow::Result<WorkspaceFile> {
    let mut f = File::open(path)?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let file: WorkspaceFile = ron::from_str(&buf)?;
    Ok(file)
}

pub fn list_versions(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = Vec::new();
    if dir.exists() {
        for e in fs::read_dir(dir)? {
            let p = e?.path();
            if let Some(name) = p.file_name().and_then(|s| s.to_str())
                && name.starts_with("state_") && name.ends_with(".ron")
            {
                entries.push(p);
            }
        }
    }
    // newest first (timestamped names sort chronologically)
    entries.sort();
    entries.reverse();
    Ok(entries)
}
