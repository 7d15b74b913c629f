// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use life_core::ErrorCode;
use serial_test::serial;

#[test]
#[serial]
fn load_requires_the_build_dir_variable() {
    std::env::remove_var(life_core::ENV_BUILD_DIR);
    std::env::set_var(ENV_STATE_DIR, "/tmp/life-test-state");

    let err = Config::load().unwrap_err();
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(err.message.unwrap_or_default().contains(life_core::ENV_BUILD_DIR));

    std::env::remove_var(ENV_STATE_DIR);
}

#[test]
#[serial]
fn load_derives_paths_from_the_state_dir() {
    std::env::set_var(ENV_STATE_DIR, "/tmp/life-test-state");
    std::env::set_var(life_core::ENV_BUILD_DIR, "/tmp/life-build");

    let config = Config::load().unwrap();
    assert_eq!(config.state_dir, PathBuf::from("/tmp/life-test-state"));
    assert_eq!(config.build_dir, PathBuf::from("/tmp/life-build"));
    assert_eq!(config.lock_path, PathBuf::from("/tmp/life-test-state/lifed.pid"));
    assert_eq!(config.log_path, PathBuf::from("/tmp/life-test-state/lifed.log"));

    std::env::remove_var(ENV_STATE_DIR);
    std::env::remove_var(life_core::ENV_BUILD_DIR);
}
