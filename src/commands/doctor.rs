use crate::config::load_config;
use crate::error::StoryResult;
use crate::pipeline::assembler::FfmpegAssembler;
use colored::*;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Report on everything a generation run needs from the environment.
/// Always walks every check; a failure is reported, not short-circuited.
pub fn run() -> StoryResult<()> {
    let config = load_config(None)?;
    let mut healthy = true;

    match FfmpegAssembler::probe() {
        Ok(()) => println!("{} ffmpeg found on PATH", "ok:".green().bold()),
        Err(e) => {
            healthy = false;
            println!("{} {e}", "fail:".red().bold());
            if let Some(hint) = e.hint() {
                println!("      {hint}");
            }
        }
    }

    match std::env::var("COMPLETION_API_KEY") {
        Ok(key) if !key.is_empty() => {
            println!("{} COMPLETION_API_KEY is set", "ok:".green().bold())
        }
        _ => println!(
            "{} COMPLETION_API_KEY not set; prompts will fall back to scene numbering",
            "warn:".yellow().bold()
        ),
    }

    let agent = probe_agent();
    report_endpoint(&agent, "completion endpoint", &config.completion.base_url);
    report_endpoint(&agent, "image endpoint", &config.images.base_url);

    if healthy {
        Ok(())
    } else {
        Err(crate::error::StoryError::EncoderUnavailable)
    }
}

fn probe_agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(PROBE_TIMEOUT))
        .http_status_as_error(false)
        .build()
        .into()
}

fn report_endpoint(agent: &ureq::Agent, label: &str, url: &str) {
    if endpoint_reachable(agent, url) {
        println!("{} {label} reachable: {url}", "ok:".green().bold());
    } else {
        println!(
            "{} {label} unreachable: {url}",
            "warn:".yellow().bold()
        );
    }
}

/// Any HTTP response counts as reachable; only transport failures
/// (DNS, refused connection, timeout) mean the service is down.
fn endpoint_reachable(agent: &ureq::Agent, url: &str) -> bool {
    agent.get(url).call().is_ok()
}
