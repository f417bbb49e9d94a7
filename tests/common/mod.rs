//! Common test utilities and helpers
//!
//! Builds a fake NuttX workspace: just enough of a kernel tree and apps tree
//! for validation to pass, plus shell scripts standing in for `make` and
//! `tools/configure.sh`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Defconfig shipped with the fake `sim` board
pub const SIM_DEFCONFIG: &str = "\
CONFIG_ARCH=\"sim\"
CONFIG_BOARD_LOOPSPERMSEC=0
# CONFIG_DEBUG_FEATURES is not set
CONFIG_NSH_PROMPT_STRING=\"nsh> \"
CONFIG_RAM_START=0x00000000
CONFIG_SYSTEM_NSH=y
";

/// Stand-in for `make`: records targets, fails when `fail-build` exists
pub const FAKE_MAKE: &str = r#"
case "$1" in
  clean) rm -f built.txt; echo cleaned ;;
  distclean) rm -f .config built.txt; echo distcleaned ;;
  olddefconfig) echo normalized >> normalized.txt ;;
  menuconfig) exit 0 ;;
  -j*)
    if [ -f fail-build ]; then echo "error: build broke" >&2; exit 4; fi
    echo "$1 $PWD" > built.txt
    printf '\033[32mCC\033[0m main.o\n'
    ;;
  *) echo "unknown target $1" >&2; exit 2 ;;
esac
"#;

/// Stand-in for `tools/configure.sh`: copies the selected defconfig
pub const FAKE_CONFIGURE: &str = r#"
echo "$@" > configured.txt
target="$3"
board="${target%%:*}"
config="${target#*:}"
src=$(find boards -path "*/$board/configs/$config/defconfig" | head -n 1)
[ -n "$src" ] || { echo "no such board $target" >&2; exit 1; }
cp "$src" .config
"#;

/// Fake NuttX workspace plus an isolated config directory
pub struct NuttxWorkspace {
    /// Workspace root holding `nuttx/` and `nuttx-apps/`
    pub dir: TempDir,
    /// Value of `NTXBUILD_CONFIG_DIR`
    pub config_dir: TempDir,
    /// Target directory for workspace copies
    pub clone_dir: TempDir,
}

impl NuttxWorkspace {
    /// Workspace with valid trees and fake tools, not yet started
    pub fn new() -> Self {
        let ws = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
            config_dir: TempDir::new().expect("Failed to create config directory"),
            clone_dir: TempDir::new().expect("Failed to create clone directory"),
        };
        ws.create_file("nuttx/Makefile", "all:\n");
        ws.create_file("nuttx/INVIOLABLES.md", "# Inviolables\n");
        ws.create_file("nuttx/tools/configure.sh", FAKE_CONFIGURE);
        ws.create_file("nuttx/boards/sim/sim/sim/configs/nsh/defconfig", SIM_DEFCONFIG);
        ws.create_file("nuttx/boards/sim/sim/sim/configs/ostest/defconfig", SIM_DEFCONFIG);
        ws.create_file(
            "nuttx/boards/arm/rp2040/raspberrypi-pico/configs/nsh/defconfig",
            "CONFIG_ARCH=\"arm\"\n",
        );
        ws.create_file("nuttx/.git/HEAD", "ref: refs/heads/master\n");
        ws.create_file("nuttx-apps/Make.defs", "");
        ws.create_file("nuttx-apps/.git/HEAD", "ref: refs/heads/master\n");
        ws.create_file("fake-make.sh", FAKE_MAKE);
        ws.write_settings("");
        ws
    }

    /// Workspace already configured for `sim:nsh`
    pub fn started() -> Self {
        let ws = Self::new();
        let output = ws.run(&["start", "sim", "nsh"]);
        assert!(
            output.status.success(),
            "start failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        ws
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn nuttx(&self) -> PathBuf {
        self.dir.path().join("nuttx")
    }

    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// `config.toml` using the fake make plus `extra` lines in `[build]`
    pub fn write_settings(&self, extra: &str) {
        let content = format!(
            "[build]\nmake = \"sh {}\"\nclone_dir = \"{}\"\n{extra}\n",
            self.dir.path().join("fake-make.sh").display(),
            self.clone_dir.path().display()
        );
        std::fs::write(self.config_dir.path().join("config.toml"), content)
            .expect("Failed to write settings");
    }

    /// Number of entries left in the clone directory
    pub fn clone_count(&self) -> usize {
        std::fs::read_dir(self.clone_dir.path())
            .expect("Failed to read clone directory")
            .count()
    }

    /// Run the binary from the workspace root
    pub fn run(&self, args: &[&str]) -> Output {
        self.run_in(self.dir.path(), args)
    }

    /// Run the binary from `cwd`
    pub fn run_in(&self, cwd: &Path, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_ntxbuild"))
            .current_dir(cwd)
            .env("NTXBUILD_CONFIG_DIR", self.config_dir.path())
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .expect("Failed to execute ntxbuild")
    }
}

impl Default for NuttxWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
