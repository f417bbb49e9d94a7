//! Board and defconfig discovery
//!
//! Boards live at `<nuttx>/boards/<arch>/<soc>/<board>/configs/<defconfig>/`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

/// One named configuration preset of a board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Defconfig {
    /// Preset name (directory name under `configs/`)
    pub name: String,
    /// Preset directory
    pub path: PathBuf,
}

impl Defconfig {
    /// Content of the preset's `defconfig` file
    pub fn content(&self) -> std::io::Result<String> {
        std::fs::read_to_string(self.path.join("defconfig"))
    }
}

/// A board directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    pub name: String,
    pub arch: String,
    pub soc: String,
    pub path: PathBuf,
    /// Presets sorted by name
    pub defconfigs: Vec<Defconfig>,
}

impl Board {
    fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_string();
        let soc_dir = path.parent()?;
        let soc = soc_dir.file_name()?.to_string_lossy().to_string();
        let arch = soc_dir.parent()?.file_name()?.to_string_lossy().to_string();

        let mut defconfigs: Vec<Defconfig> = std::fs::read_dir(path.join("configs"))
            .ok()?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .map(|entry| Defconfig {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path(),
            })
            .collect();
        defconfigs.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Found {} configs for {name}", defconfigs.len());

        Some(Self {
            name,
            arch,
            soc,
            path: path.to_path_buf(),
            defconfigs,
        })
    }

    /// Preset by name
    pub fn defconfig(&self, name: &str) -> Option<&Defconfig> {
        self.defconfigs.iter().find(|d| d.name == name)
    }
}

/// Which boards to list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BoardFilter {
    #[default]
    All,
    Arch(String),
    Soc(String),
    Board(String),
}

impl BoardFilter {
    fn matches(&self, board: &Board) -> bool {
        match self {
            Self::All => true,
            Self::Arch(arch) => &board.arch == arch,
            Self::Soc(soc) => &board.soc == soc,
            Self::Board(name) => &board.name == name,
        }
    }
}

/// Searches the `boards/` tree of a NuttX checkout
#[derive(Debug, Clone)]
pub struct BoardExplorer {
    boards_dir: PathBuf,
}

impl BoardExplorer {
    pub fn new(nuttx_path: &Path) -> Self {
        Self {
            boards_dir: nuttx_path.join("boards"),
        }
    }

    /// Boards matching `filter`, sorted by name
    pub fn search(&self, filter: &BoardFilter) -> Vec<Board> {
        let mut boards: Vec<Board> = WalkDir::new(&self.boards_dir)
            .min_depth(3)
            .max_depth(3)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir() && entry.path().join("configs").is_dir())
            .filter_map(|entry| Board::from_path(entry.path()))
            .filter(|board| filter.matches(board))
            .collect();
        boards.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        debug!("Found {} boards", boards.len());
        boards
    }

    /// First board with this exact name
    pub fn find(&self, name: &str) -> Option<Board> {
        self.search(&BoardFilter::Board(name.to_string()))
            .into_iter()
            .next()
    }
}
