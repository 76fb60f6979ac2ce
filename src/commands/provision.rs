use anyhow::Result;
use hostkit::backend::{self, Backend};
use hostkit::{OsFamily, Platform, packages, platform};
use std::io::IsTerminal;

use crate::Context;
use crate::cli::Cli;
use crate::config::{Layout, Settings};
use crate::engine;
use crate::prompt::{DeclineAll, Prompter, TerminalPrompter};
use crate::resource::{self, HostContext};
use crate::session::SessionState;
use crate::{privilege, ui};

pub fn run(ctx: &Context, cli: &Cli) -> Result<()> {
    if !ctx.quiet {
        ui::banner();
    }

    privilege::require_root().map_err(fatal)?;
    let settings = Settings::load(cli.config.as_deref())?;
    let platform = platform::detect().map_err(fatal)?;
    let layout = Layout::from_settings(&settings);
    let backend = backend::default_backend();

    if ctx.verbose > 0 {
        print_layout(&platform, &layout);
    }

    let host = HostContext {
        settings: &settings,
        layout: &layout,
        backend: &backend,
    };
    let resources = resource::provisioners();
    let mut session = SessionState::default();

    if cli.check {
        ui::info("Check mode: skipping package install and configuration");
    } else {
        let mut prompter = choose_prompter();
        install_dependencies(&backend, platform.family, &settings.extra_packages);

        ui::header("Configuration");
        if prompter.confirm("Configure this host now?", true)? {
            let summary = engine::execute(&resources, &host, &mut session, prompter.as_mut());
            log::debug!("Run summary: {summary:?}");
            if summary.is_success() && summary.total_changes() == 0 {
                ui::info("Host was already configured");
            }
        } else {
            ui::info("Skipping configuration");
        }
    }

    let report = engine::check(&resources, &host, &session);
    engine::print_report(&report);
    Ok(())
}

/// Print category advice for a setup error and abort the run
fn fatal(err: hostkit::Error) -> anyhow::Error {
    let category = err.category();
    ui::error(&format!("{}: {err}", category.description()));
    ui::dim(category.advice());
    err.into()
}

fn choose_prompter() -> Box<dyn Prompter> {
    if std::io::stdin().is_terminal() {
        Box::new(TerminalPrompter::new())
    } else {
        ui::warn("stdin is not a terminal; every step will be declined");
        Box::new(DeclineAll)
    }
}

/// Fixed dependency set plus configured extras, without duplicates
fn package_list(family: OsFamily, extra: &[String]) -> Vec<String> {
    let mut wanted: Vec<String> = packages::dependency_set(family)
        .iter()
        .map(|p| (*p).to_string())
        .collect();
    for package in extra {
        if !wanted.contains(package) {
            wanted.push(package.clone());
        }
    }
    wanted
}

fn install_dependencies(backend: &dyn Backend, family: OsFamily, extra: &[String]) {
    let wanted = package_list(family, extra);
    ui::section(&format!(
        "Installing {} with {}",
        ui::plural(wanted.len(), "package"),
        family.package_manager()
    ));

    ui::dim(&wanted.join(" "));

    // Configuration can still proceed; the health report shows what is missing
    match backend.install_packages(family, &wanted) {
        Ok(()) => ui::success("Dependencies installed"),
        Err(e) => ui::error(&format!("Package install failed: {e}")),
    }
}

fn print_layout(platform: &Platform, layout: &Layout) {
    ui::section("Host");
    ui::kv("platform", &format!("{} ({})", platform.name, platform.family));
    ui::kv("account", &layout.account);
    ui::kv("home", &layout.home.to_string_lossy());
    ui::kv("units", &layout.service_unit.to_string_lossy());
}
