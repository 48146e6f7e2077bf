//! Behaviour-driven step definitions driving the load command scenarios.

use super::helpers::{DatasetFiles, load_with_args};
use super::*;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

/// Load command scenario state shared through a single world argument.
#[derive(Debug)]
struct LoadWorld {
    dataset_files: DatasetFiles,
    cli_args: RefCell<Vec<String>>,
    cli_result: RefCell<Option<Result<LoadSummary, CliError>>>,
}

impl LoadWorld {
    fn new() -> Self {
        let dataset_files = DatasetFiles::new();
        let cli_args = RefCell::new(dataset_files.path_args());
        Self {
            dataset_files,
            cli_args,
            cli_result: RefCell::new(None),
        }
    }

    fn summary(&self) -> LoadSummary {
        let borrowed = self.cli_result.borrow();
        match borrowed.as_ref().expect("result recorded") {
            Ok(summary) => *summary,
            Err(err) => panic!("expected success, found {err:?}"),
        }
    }
}

#[fixture]
fn world() -> LoadWorld {
    LoadWorld::new()
}

#[given("a data directory holding the Wards set")]
fn wards_set(#[from(world)] world: &LoadWorld) {
    world.dataset_files.write_wards("wards", "Wards");
}

#[given("a data directory holding a set without shapefiles")]
fn broken_set(#[from(world)] world: &LoadWorld) {
    world.dataset_files.write_broken("broken", "Broken");
}

#[given("the load command has already run")]
fn already_loaded(#[from(world)] world: &LoadWorld) {
    let args = world.cli_args.borrow().clone();
    load_with_args(args).expect("initial load");
}

#[given("I pass the reload flag")]
fn reload_flag(#[from(world)] world: &LoadWorld) {
    world.cli_args.borrow_mut().push("--reload".to_owned());
}

#[given("the data directory points at a missing path")]
fn missing_data_dir(#[from(world)] world: &LoadWorld) {
    *world.cli_args.borrow_mut() = vec![
        format!("--{ARG_DATA_DIR}"),
        world.dataset_files.missing_dir().into_string(),
    ];
}

#[when("I run the load command")]
fn run_load_command(#[from(world)] world: &LoadWorld) {
    let args = world.cli_args.borrow().clone();
    world.cli_result.replace(Some(load_with_args(args)));
}

#[then("the summary reports 1 loaded set with 2 boundaries")]
fn reports_loaded(#[from(world)] world: &LoadWorld) {
    let summary = world.summary();
    assert_eq!((summary.loaded, summary.boundaries), (1, 2));
    assert_eq!(summary.skipped, 0);
}

#[then("the summary reports 1 skipped set")]
fn reports_skipped(#[from(world)] world: &LoadWorld) {
    let summary = world.summary();
    assert_eq!((summary.loaded, summary.skipped), (0, 1));
}

#[then("the CLI reports that 1 of 2 sets failed")]
fn reports_failed(#[from(world)] world: &LoadWorld) {
    let borrowed = world.cli_result.borrow();
    let error = borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect_err("expected error");
    match error {
        CliError::SetsFailed { failed, attempted } => {
            assert_eq!((*failed, *attempted), (1, 2));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[then("the CLI reports that the \"data-dir\" path does not exist")]
fn reports_missing_dir(#[from(world)] world: &LoadWorld) {
    let borrowed = world.cli_result.borrow();
    let error = borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect_err("expected error");
    match error {
        CliError::MissingDataDirectory { field, .. } => assert_eq!(*field, ARG_DATA_DIR),
        other => panic!("unexpected error {other:?}"),
    }
}

macro_rules! register_load_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/load_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: LoadWorld) {
            let _ = world;
        }
    };
}

register_load_scenario!(loading_every_set, "loading every discovered set");
register_load_scenario!(
    skipping_without_reload,
    "skipping loaded sets without the reload flag"
);
register_load_scenario!(
    replacing_with_reload,
    "replacing loaded sets with the reload flag"
);
register_load_scenario!(failing_sets, "failing when a set cannot be loaded");
register_load_scenario!(rejecting_missing_dir, "rejecting a missing data directory");
