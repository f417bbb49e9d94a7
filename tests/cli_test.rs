//! Integration tests for the ntxbuild binary
//!
//! Each test gets its own fake workspace and config directory; `make` and
//! `configure.sh` are shell scripts.

#![cfg(unix)]

mod common;

use common::{stderr, stdout, NuttxWorkspace};

// ============================================
// start / info
// ============================================

#[test]
fn test_start_persists_environment_and_configures() {
    let ws = NuttxWorkspace::new();

    let output = ws.run(&["start", "sim", "nsh"]);
    assert!(output.status.success(), "{}", stderr(&output));

    assert_eq!(
        ws.read_file(".ntxenv"),
        "nuttx_dir=nuttx\napps_dir=nuttx-apps\nboard=sim\ndefconfig=nsh\n"
    );
    assert_eq!(ws.read_file("nuttx/configured.txt").trim(), "-a ../nuttx-apps sim:nsh");
    assert!(ws.file_exists("nuttx/.config"));
}

#[test]
fn test_start_from_subdirectory_finds_root() {
    let ws = NuttxWorkspace::new();

    let output = ws.run_in(&ws.nuttx().join("boards"), &["start", "sim", "ostest"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(ws.file_exists(".ntxenv"));
}

#[test]
fn test_start_without_apps_dir_fails_cleanly() {
    let ws = NuttxWorkspace::new();

    let output = ws.run(&["start", "sim", "nsh", "--apps-dir", "apps"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("apps"));
    assert!(!ws.file_exists(".ntxenv"));
}

#[test]
fn test_start_unknown_board_leaves_no_environment() {
    let ws = NuttxWorkspace::new();

    let output = ws.run(&["start", "nosuchboard", "nsh"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("setup failed"));
    assert!(!ws.file_exists(".ntxenv"));
}

#[test]
fn test_restart_on_broken_sources_keeps_environment() {
    let ws = NuttxWorkspace::started();
    ws.run(&["build"]);
    let before = ws.read_file(".ntxenv");
    std::fs::remove_file(ws.nuttx().join("INVIOLABLES.md")).unwrap();

    let output = ws.run(&["start", "sim", "ostest"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("INVIOLABLES.md"));
    assert_eq!(ws.read_file(".ntxenv"), before);
    assert!(ws.file_exists(".ntxbuild/last-build.json"));
    assert!(!ws.read_file("nuttx/configured.txt").contains("ostest"));
}

#[test]
fn test_restart_with_failing_configure_restores_environment() {
    let ws = NuttxWorkspace::started();
    let before = ws.read_file(".ntxenv");

    let output = ws.run(&["start", "nosuchboard", "nsh"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("setup failed"));
    assert_eq!(ws.read_file(".ntxenv"), before);
}

#[test]
fn test_info_reports_environment() {
    let ws = NuttxWorkspace::started();

    let output = ws.run(&["info"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Board:      sim"));
    assert!(out.contains("Defconfig:  nsh"));
    assert!(out.contains("Last build: none"));
}

#[test]
fn test_info_before_start() {
    let ws = NuttxWorkspace::new();

    let output = ws.run(&["info"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("NuttX root found at"));
    assert!(!ws.file_exists(".ntxenv"));
}

// ============================================
// build
// ============================================

#[test]
fn test_build_without_start_creates_nothing() {
    let ws = NuttxWorkspace::new();

    let output = ws.run(&["build"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("ntxbuild start"));
    assert!(!ws.file_exists(".ntxenv"));
    assert!(!ws.file_exists(".ntxbuild"));
}

#[test]
fn test_build_in_primary_workspace() {
    let ws = NuttxWorkspace::started();

    let output = ws.run(&["build", "--jobs", "3"]);
    assert!(output.status.success(), "{}", stderr(&output));

    // Raw escape codes pass through untouched
    assert!(stdout(&output).contains("\x1b[32mCC\x1b[0m main.o"));
    assert!(ws.read_file("nuttx/built.txt").starts_with("-j3 "));
    assert!(ws.file_exists(".ntxbuild/last-build.json"));
    assert_eq!(ws.clone_count(), 0);
}

#[test]
fn test_parallel_build_cleans_up_copies() {
    let ws = NuttxWorkspace::started();

    let output = ws.run(&["build", "-j", "3", "--jobs", "1"]);
    assert!(output.status.success(), "{}", stderr(&output));

    assert_eq!(stdout(&output).matches("main.o").count(), 3);
    assert!(!ws.file_exists("nuttx/built.txt"));
    assert_eq!(ws.clone_count(), 0);

    let info = stdout(&ws.run(&["info"]));
    assert!(info.contains("Last build: 3 ok / 3 total (parallel=3)"));
}

#[test]
fn test_parallel_from_settings_and_keep_copies() {
    let ws = NuttxWorkspace::started();
    ws.write_settings("parallel = 2\nkeep_copies = true");

    let output = ws.run(&["build"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(ws.clone_count(), 2);
}

#[test]
fn test_build_failure_exit_code() {
    let ws = NuttxWorkspace::started();
    ws.create_file("nuttx/fail-build", "");

    let output = ws.run(&["build"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("error: build broke"));
    assert!(stderr(&output).contains("1 of 1 build(s) failed"));
}

#[test]
fn test_parallel_build_failure_still_cleans_up() {
    let ws = NuttxWorkspace::started();
    ws.create_file("nuttx/fail-build", "");

    let output = ws.run(&["build", "-j", "2"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("2 of 2 build(s) failed"));
    assert_eq!(ws.clone_count(), 0);
}

#[test]
fn test_unknown_setting_is_rejected() {
    let ws = NuttxWorkspace::started();
    ws.write_settings("colour = \"blue\"");

    let output = ws.run(&["build"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("config.toml"));
}

// ============================================
// clean / distclean
// ============================================

#[test]
fn test_clean_runs_in_primary() {
    let ws = NuttxWorkspace::started();
    ws.run(&["build"]);
    assert!(ws.file_exists("nuttx/built.txt"));

    let output = ws.run(&["clean"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(!ws.file_exists("nuttx/built.txt"));
    assert!(ws.file_exists(".ntxenv"));
}

#[test]
fn test_distclean_resets_environment() {
    let ws = NuttxWorkspace::started();
    ws.run(&["build"]);

    let output = ws.run(&["distclean"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(!ws.file_exists(".ntxenv"));
    assert!(!ws.file_exists(".ntxbuild"));
    assert!(!ws.file_exists("nuttx/.config"));
    assert!(ws.file_exists("nuttx/Makefile"));
}

// ============================================
// kconfig
// ============================================

#[test]
fn test_kconfig_set_and_read() {
    let ws = NuttxWorkspace::started();

    let output = ws.run(&["kconfig", "set-value", "DEBUG_FEATURES", "y"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let output = ws.run(&["kconfig", "read", "CONFIG_DEBUG_FEATURES"]);
    assert_eq!(stdout(&output).trim(), "y");
    assert!(ws.read_file("nuttx/.config").contains("\nCONFIG_DEBUG_FEATURES=y\n"));
}

#[test]
fn test_kconfig_set_twice_is_idempotent() {
    let ws = NuttxWorkspace::started();

    ws.run(&["kconfig", "set-str", "NSH_PROMPT_STRING", "ntx> "]);
    let first = ws.read_file("nuttx/.config");
    let output = ws.run(&["kconfig", "set-str", "NSH_PROMPT_STRING", "ntx> "]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("already"));
    assert_eq!(ws.read_file("nuttx/.config"), first);
}

#[test]
fn test_kconfig_read_all() {
    let ws = NuttxWorkspace::started();

    let output = ws.run(&["kconfig", "read"]);
    let out = stdout(&output);
    assert!(out.contains("CONFIG_ARCH=sim\n"));
    assert!(out.contains("CONFIG_DEBUG_FEATURES=n\n"));
    assert!(out.contains("CONFIG_RAM_START=0x00000000\n"));
}

#[test]
fn test_kconfig_unknown_key() {
    let ws = NuttxWorkspace::started();
    let before = ws.read_file("nuttx/.config");

    let output = ws.run(&["kconfig", "set-value", "CONFIG_NOT_THERE", "y"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("CONFIG_NOT_THERE"));
    assert_eq!(ws.read_file("nuttx/.config"), before);
}

#[test]
fn test_kconfig_set_num_rejects_wrong_base() {
    let ws = NuttxWorkspace::started();

    let output = ws.run(&["kconfig", "set-num", "RAM_START", "4096"]);
    assert_eq!(output.status.code(), Some(1));

    let output = ws.run(&["kconfig", "set-num", "RAM_START", "0x1000"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(ws.read_file("nuttx/.config").contains("CONFIG_RAM_START=0x1000"));
}

#[test]
fn test_kconfig_merge_and_apply() {
    let ws = NuttxWorkspace::started();
    ws.create_file("debug.fragment", "CONFIG_DEBUG_FEATURES=y\nCONFIG_BOARD_LOOPSPERMSEC=100\n");

    let fragment = ws.path().join("debug.fragment");
    let output = ws.run(&["kconfig", "merge", fragment.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("2 option(s) changed"));

    let output = ws.run(&["kconfig", "apply"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(ws.read_file("nuttx/normalized.txt").trim(), "normalized");
}

#[test]
fn test_kconfig_without_config_file() {
    let ws = NuttxWorkspace::started();
    std::fs::remove_file(ws.nuttx().join(".config")).unwrap();

    let output = ws.run(&["kconfig", "read"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Configuration file not found"));
}

// ============================================
// list / output modes
// ============================================

#[test]
fn test_list_boards() {
    let ws = NuttxWorkspace::new();

    let output = ws.run(&["list"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("raspberrypi-pico"));
    assert!(out.contains("sim/sim (2 defconfigs)"));
    assert!(out.contains("Total boards: 2"));
}

#[test]
fn test_list_single_board_shows_defconfigs() {
    let ws = NuttxWorkspace::new();

    let output = ws.run(&["list", "--board", "sim"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "sim (sim/sim)\n  nsh\n  ostest\n");
}

#[test]
fn test_list_filters_conflict() {
    let ws = NuttxWorkspace::new();

    let output = ws.run(&["list", "--arch", "arm", "--soc", "rp2040"]);
    assert!(!output.status.success());
}

#[test]
fn test_quiet_hides_status_lines() {
    let ws = NuttxWorkspace::started();

    let output = ws.run(&["-q", "kconfig", "set-value", "DEBUG_FEATURES", "y"]);
    assert!(output.status.success());
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_verbose_logs_to_stderr() {
    let ws = NuttxWorkspace::started();

    let output = ws.run(&["-vv", "build"]);
    assert!(output.status.success());
    assert!(stderr(&output).contains("DEBUG"));
    assert!(!stdout(&output).contains("DEBUG"));
}
