//! Command implementations

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::adapters::libav_sink::LibavSinkFactory;
use crate::adapters::libav_source::LibavSourceOpener;
use crate::adapters::probe_libav::LibavProbe;
use crate::app::{BatchRunner, ParticipantInteractor, ReconstructionSettings};
use crate::cli::args::{MergeAudioArgs, ReconstructArgs, ResolveArgs, RewrapArgs};
use crate::config::AppConfig;
use crate::domain::model::{ParticipantReport, ReadFailurePolicy, Role, SeekMode};
use crate::domain::rules::EmissionPlanner;
use crate::engine::{AudioCodecMode, AudioMerger, RewrapMode, RewrapOutcome, Rewrapper};
use crate::resolver::{AnalysisLayout, ParticipantResolver, ResolvedSegment, SourceCatalog};

/// Execute the reconstruct command
pub fn reconstruct(args: ReconstructArgs, config: &AppConfig) -> Result<()> {
    let mut config = config.clone();
    if let Some(mode) = &args.seek_mode {
        config.reconstruct.seek_mode = SeekMode::parse(mode)?;
    }
    if let Some(policy) = &args.on_read_failure {
        config.reconstruct.read_failure_policy = ReadFailurePolicy::parse(policy)?;
    }
    if let Some(codec) = &args.codec {
        config.encoder.codec = codec.clone();
    }
    config.validate()?;

    info!("Analysis root: {}", args.analysis_root.display());
    info!("Sources: {}", args.sources.display());
    info!(
        "Seek mode: {:?}, read failures: {:?}, encoder: {}",
        config.reconstruct.seek_mode, config.reconstruct.read_failure_policy, config.encoder.codec
    );

    crate::init().context("Failed to initialize FFmpeg")?;

    let catalog = SourceCatalog::discover(&args.sources, &config.sources.extensions)
        .context("Failed to scan source directory")?;
    info!("Found {} candidate source file(s)", catalog.len());

    let settings = ReconstructionSettings {
        seek_mode: config.reconstruct.seek_mode,
        read_failure_policy: config.reconstruct.read_failure_policy,
        output_dir_name: config.reconstruct.output_dir_name.clone(),
        output_extension: config.reconstruct.output_extension.clone(),
    };
    let interactor = Arc::new(ParticipantInteractor::new(
        Arc::new(LibavSourceOpener),
        Arc::new(LibavSinkFactory::new(config.encoder.clone())),
        settings,
    ));
    let runner = BatchRunner::new(
        interactor,
        AnalysisLayout::new(&args.analysis_root),
        catalog,
        args.jobs,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(runner.jobs().min(4))
        .enable_all()
        .build()
        .context("Failed to start worker runtime")?;
    let reports = runtime.block_on(runner.run(&args.participants));

    print_reports(&reports);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    let halted: Vec<u32> = reports
        .iter()
        .filter(|r| r.is_halted())
        .map(|r| r.participant_id)
        .collect();
    if !halted.is_empty() {
        return Err(anyhow::anyhow!(
            "{} participant(s) halted with a fatal error: {:?}",
            halted.len(),
            halted
        ));
    }

    info!("Reconstruct operation completed successfully");
    Ok(())
}

fn print_reports(reports: &[ParticipantReport]) {
    for report in reports {
        println!(
            "pp{} ({}): {} completed, {} skipped{}",
            report.participant_id,
            report.role,
            report.completed_count(),
            report.skipped_count(),
            match &report.halted {
                Some(reason) => format!(", halted: {}", reason),
                None => String::new(),
            }
        );
    }
}

/// Resolver output for one participant
#[derive(Serialize)]
struct ResolveReport {
    participant_id: u32,
    role: Role,
    segments: Vec<ResolvedSegment>,
    halted: Option<String>,
}

/// Execute the resolve command
pub fn resolve(args: ResolveArgs, config: &AppConfig) -> Result<()> {
    let seek_mode = match &args.seek_mode {
        Some(mode) => SeekMode::parse(mode)?,
        None => config.reconstruct.seek_mode,
    };

    let layout = AnalysisLayout::new(&args.analysis_root);
    let catalog = SourceCatalog::discover(&args.sources, &config.sources.extensions)
        .context("Failed to scan source directory")?;
    let resolver = ParticipantResolver::new(&layout, &catalog, args.participant, seek_mode);

    let (segments, failure) = resolver.resolve_all();
    let report = ResolveReport {
        participant_id: args.participant,
        role: resolver.role(),
        segments,
        halted: failure.as_ref().map(|e| e.to_string()),
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize resolution")?
        );
    } else {
        print_resolution(&report);
    }

    match failure {
        Some(e) => {
            error!("Resolution halted: {}", e);
            Err(anyhow::Error::new(e).context(format!(
                "Failed to resolve participant {}",
                args.participant
            )))
        }
        None => Ok(()),
    }
}

fn print_resolution(report: &ResolveReport) {
    println!("Participant {} ({})", report.participant_id, report.role);
    for resolved in &report.segments {
        match &resolved.frames {
            Ok(plan) => {
                let emissions = EmissionPlanner::plan(plan);
                println!(
                    "  {:<16} {}  start={} frames={} fillers={}",
                    resolved.segment.name,
                    resolved.source.display(),
                    plan.start_frame,
                    plan.len(),
                    EmissionPlanner::filler_total(&emissions)
                );
            }
            Err(reason) => {
                println!(
                    "  {:<16} {}  skipped: {}",
                    resolved.segment.name,
                    resolved.source.display(),
                    reason
                );
            }
        }
    }
    if let Some(reason) = &report.halted {
        println!("  halted: {}", reason);
    }
}

/// Execute the rewrap command
pub fn rewrap(args: RewrapArgs, config: &AppConfig) -> Result<()> {
    let mode = match &args.mode {
        Some(mode) => RewrapMode::parse(mode)?,
        None => config.rewrap.mode,
    };

    crate::init().context("Failed to initialize FFmpeg")?;

    let probe = LibavProbe;
    let opener = LibavSourceOpener;
    let sinks = LibavSinkFactory::new(config.encoder.clone());
    let rewrapper = Rewrapper::new(&probe, &opener, &sinks).with_mode(mode);

    let outcome = rewrapper
        .rewrap(&args.input, &args.output_root)
        .with_context(|| format!("Failed to rewrap {}", args.input.display()))?;

    match &outcome {
        RewrapOutcome::AlreadyHasMetadata => {
            println!("{}: frame count present, nothing to do", args.input.display())
        }
        RewrapOutcome::AlreadyRewrapped { path } => {
            warn!("Target already exists");
            println!("{}: already rewrapped", path.display())
        }
        RewrapOutcome::Rewrapped { path, frames } => {
            println!("{}: {} frames", path.display(), frames)
        }
    }
    Ok(())
}

/// Execute the merge-audio command
pub fn merge_audio(args: MergeAudioArgs, config: &AppConfig) -> Result<()> {
    let mode = match &args.audio_codec {
        Some(mode) => AudioCodecMode::parse(mode)?,
        None => config.audio.codec_mode,
    };

    crate::init().context("Failed to initialize FFmpeg")?;

    let summary = AudioMerger::new()
        .with_mode(mode)
        .with_aac_bit_rate(config.audio.aac_bit_rate)
        .merge(&args.video, &args.audio, &args.output)
        .context("Failed to merge audio")?;

    println!(
        "{}: {} video packets, {} audio packets",
        summary.path.display(),
        summary.video_packets,
        summary.audio_packets
    );
    Ok(())
}
