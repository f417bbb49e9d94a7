//! Default configuration values

/// Environment descriptor file at the workspace root
pub const ENV_FILE_NAME: &str = ".ntxenv";

/// Orchestrator-managed state directory at the workspace root
pub const STATE_DIR_NAME: &str = ".ntxbuild";

/// Last build summary, inside [`STATE_DIR_NAME`]
pub const BUILD_REPORT_FILE: &str = "last-build.json";

/// Default NuttX kernel directory name
pub const NUTTX_DEFAULT_DIR_NAME: &str = "nuttx";

/// Default NuttX applications directory name
pub const NUTTX_APPS_DEFAULT_DIR_NAME: &str = "nuttx-apps";

/// Kconfig assignment file inside the NuttX directory
pub const KCONFIG_FILE_NAME: &str = ".config";

/// Kconfig symbol prefix
pub const KCONFIG_PREFIX: &str = "CONFIG_";

/// Default build tool
pub const DEFAULT_MAKE: &str = "make";

/// Target that normalizes `.config` after a manual edit
pub const DEFAULT_NORMALIZE_TARGET: &str = "olddefconfig";

/// Interactive configuration target
pub const MENUCONFIG_TARGET: &str = "menuconfig";

/// Clean target
pub const CLEAN_TARGET: &str = "clean";

/// Distclean target
pub const DISTCLEAN_TARGET: &str = "distclean";

/// Configure script, relative to the NuttX directory
pub const CONFIGURE_SCRIPT: &str = "./tools/configure.sh";

/// Shell the configure script runs under
pub const CONFIGURE_SHELL: &str = "bash";

/// Prefix of workspace copy directory names
pub const COPY_PREFIX: &str = "nuttxspace_";

/// Default number of parallel workspace copies
pub const DEFAULT_PARALLEL: usize = 1;

/// Entries never copied into a workspace clone, matched by name at any depth
pub const CLONE_EXCLUDES: &[&str] = &[
    ".git",
    ".github",
    ".gitattributes",
    ".svn",
    ".hg",
    ".vscode",
    ".idea",
    STATE_DIR_NAME,
    "__pycache__",
];

/// Build outputs left out of a clone when found directly inside a source
/// tree (`nuttx/staging`, an out-of-tree CMake `build/`, final images)
pub const CLONE_TREE_ARTIFACTS: &[&str] = &[
    "staging",
    "build",
    "nuttx.bin",
    "nuttx.hex",
    "nuttx.map",
    "nuttx.srec",
    "System.map",
];

/// Hidden entries kept in a workspace clone despite the hidden-file rule
pub const CLONE_HIDDEN_ALLOWED: &[&str] = &[ENV_FILE_NAME, KCONFIG_FILE_NAME];

/// Exit code reported when a child could not be launched inside a parallel slot
pub const LAUNCH_FAILURE_CODE: i32 = 127;

/// Exit code reported for a child killed by cancellation
pub const CANCELLED_CODE: i32 = 130;

/// Minimum proptest iterations
pub const MIN_PROPTEST_ITERATIONS: u32 = 100;
