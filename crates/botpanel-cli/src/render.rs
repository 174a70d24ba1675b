//! Headless renderer – prints what a UI would draw.
//!
//! Rasters are BMP-encoded (and written to the snapshot directory when one
//! is given) so the output proves the frames are displayable.  The battery
//! level and frame tree are printed as text.

use std::path::PathBuf;

use botpanel_perception::FrameNode;
use botpanel_perception::encode::{encode_bmp_gray, encode_bmp_rgb};
use botpanel_runtime::RenderUpdate;
use botpanel_types::PanelError;
use colored::Colorize;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Counts of rendered updates per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub rgb: u64,
    pub depth: u64,
    pub battery: u64,
    pub frames: u64,
}

#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    snapshot_dir: Option<PathBuf>,
    stats: RenderStats,
}

impl HeadlessRenderer {
    pub fn new(snapshot_dir: Option<PathBuf>) -> Self {
        Self {
            snapshot_dir,
            stats: RenderStats::default(),
        }
    }

    /// Render until every sender is gone.
    pub async fn run(mut self, mut updates: UnboundedReceiver<RenderUpdate>) -> RenderStats {
        while let Some(update) = updates.recv().await {
            let kind = update.kind();
            if let Err(e) = self.render(update) {
                warn!(kind, error = %e, "render failed");
            }
        }
        info!(
            rgb = self.stats.rgb,
            depth = self.stats.depth,
            battery = self.stats.battery,
            frames = self.stats.frames,
            "renderer stopped"
        );
        self.stats
    }

    pub fn render(&mut self, update: RenderUpdate) -> Result<(), PanelError> {
        match update {
            RenderUpdate::Rgb(frame) => {
                self.stats.rgb += 1;
                let bmp = encode_bmp_rgb(&frame)?;
                debug!(width = frame.width(), height = frame.height(), bytes = bmp.len(), "rgb frame");
                self.snapshot("rgb.bmp", &bmp)?;
            }
            RenderUpdate::Depth(mask) => {
                self.stats.depth += 1;
                let bmp = encode_bmp_gray(&mask)?;
                debug!(width = mask.width(), height = mask.height(), bytes = bmp.len(), "depth mask");
                self.snapshot("depth.bmp", &bmp)?;
            }
            RenderUpdate::Battery(level) => {
                self.stats.battery += 1;
                println!("  battery {}", battery_bar(level));
            }
            RenderUpdate::Frames(graph) => {
                self.stats.frames += 1;
                println!("{}", "  TF frames".bold());
                print!("{}", format_tree(&graph.tree()));
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    fn snapshot(&self, name: &str, bytes: &[u8]) -> Result<(), PanelError> {
        let Some(dir) = &self.snapshot_dir else {
            return Ok(());
        };
        let path = dir.join(name);
        std::fs::write(&path, bytes)
            .map_err(|e| PanelError::Serialization(format!("failed to write {}: {e}", path.display())))
    }
}

/// Ten-cell bar plus percentage, e.g. `[#####-----]  50%`.
pub fn battery_bar(level: f64) -> String {
    let level = level.clamp(0.0, 1.0);
    let filled = (level * 10.0).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(10 - filled),
        (level * 100.0).round() as u32
    )
}

/// Indented outline of a frame forest, two spaces per level.
pub fn format_tree(forest: &[FrameNode]) -> String {
    fn walk(node: &FrameNode, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth + 2));
        out.push_str(&node.name);
        out.push('\n');
        for child in &node.children {
            walk(child, depth + 1, out);
        }
    }

    let mut out = String::new();
    for root in forest {
        walk(root, 0, &mut out);
    }
    out
}
