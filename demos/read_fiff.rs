/// Read a FIFF file and print its structure and measurement metadata.
///
/// Usage: cargo run --example read_fiff -- path/to/file.fif
use fiff_io::constants::{
    channel_type_name, coord_frame_name, is_data_channel, FIFFV_EEG_CH, FIFFV_MEG_CH,
    FIFFV_STIM_CH,
};
use fiff_io::{open, read_meas_info, setup_read_raw, DirNode};
use std::env;
use std::path::Path;
use std::process;

fn print_tree(node: &DirNode, depth: usize) {
    println!(
        "{}block {} ({} tags)",
        "  ".repeat(depth),
        node.block,
        node.nent()
    );
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}

fn run(path: &Path) -> fiff_io::Result<()> {
    println!("Opening FIFF file: {}", path.display());
    println!("{}", "=".repeat(60));

    let (mut reader, tree, directory) = open(path)?;
    println!("Directory: {} tags", directory.len());
    print_tree(&tree, 0);
    println!();

    let (info, _meas) = match read_meas_info(&mut reader, &tree)? {
        Some(found) => found,
        None => {
            println!("No measurement data in this file.");
            return Ok(());
        }
    };

    println!("Basic Information:");
    println!("  Number of channels: {}", info.nchan);
    println!("  Sampling frequency: {:.2} Hz", info.sfreq);
    println!("  Band pass: {:.2} ... {:.2} Hz", info.highpass, info.lowpass);
    if let Some(t) = &info.dev_head_t {
        println!(
            "  Transform: {} -> {}",
            coord_frame_name(t.from),
            coord_frame_name(t.to)
        );
    }
    println!();

    let mut meg_count = 0;
    let mut eeg_count = 0;
    let mut stim_count = 0;
    let mut other_count = 0;
    for ch in &info.chs {
        match ch.kind {
            FIFFV_MEG_CH => meg_count += 1,
            FIFFV_EEG_CH => eeg_count += 1,
            FIFFV_STIM_CH => stim_count += 1,
            _ => other_count += 1,
        }
    }
    println!("Channel Types:");
    if meg_count > 0 {
        println!("  MEG channels: {}", meg_count);
    }
    if eeg_count > 0 {
        println!("  EEG channels: {}", eeg_count);
    }
    if stim_count > 0 {
        println!("  Stimulus channels: {}", stim_count);
    }
    if other_count > 0 {
        println!("  Other channels: {}", other_count);
    }
    let data_count = info.chs.iter().filter(|c| is_data_channel(c.kind)).count();
    println!("  Data channels: {}", data_count);
    println!();

    println!("First 10 Channels:");
    for (i, ch) in info.chs.iter().take(10).enumerate() {
        println!(
            "  {}: {} ({}) - cal={:.2e}, range={:.2e}",
            i,
            ch.ch_name,
            channel_type_name(ch.kind),
            ch.cal,
            ch.range
        );
    }
    if info.chs.len() > 10 {
        println!("  ... and {} more channels", info.chs.len() - 10);
    }
    println!();

    if !info.bads.is_empty() {
        println!("Bad channels: {}", info.bads.join(", "));
    }
    if !info.projs.is_empty() {
        println!("Projections:");
        for proj in &info.projs {
            println!(
                "  {} ({} vectors over {} channels, active: {})",
                proj.desc, proj.data.nrow, proj.data.ncol, proj.active
            );
        }
    }
    if !info.comps.is_empty() {
        println!("Compensation matrices: {}", info.comps.len());
    }

    // the raw index, if this is a raw recording
    drop(reader);
    match setup_read_raw(path, false) {
        Ok(raw) => {
            println!();
            println!(
                "Raw data: samples {} ... {} ({:.2} s) in {} buffers",
                raw.first_samp,
                raw.last_samp,
                (raw.last_samp - raw.first_samp + 1) as f64 / raw.info.sfreq as f64,
                raw.rawdir.iter().filter(|r| r.ent.is_some()).count()
            );
        }
        Err(fiff_io::Error::Structural(_)) => {}
        Err(e) => return Err(e),
    }

    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <fiff_file>", args[0]);
        eprintln!("Example: {} data/sample_audvis_raw.fif", args[0]);
        process::exit(1);
    }

    if let Err(e) = run(Path::new(&args[1])) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
