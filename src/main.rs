use basedrop::Collector;
use clap::{crate_version, Parser, Subcommand};
use midir::{Ignore, MidiInput, MidiInputConnection};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use string_synth::config::StringConfig;
use string_synth::midi::MidiEvent;
use string_synth::note::{name_from_frequency, string_for_note, Note};
use string_synth::player::Player;
use string_synth::render::{render_pluck, write_wav, RenderOptions};
use string_synth::synth::StringSynth;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often the host loop ticks the player.
const TICK: Duration = Duration::from_millis(5);

#[derive(Parser)]
#[clap(version = crate_version!(), about = "A physically modelled plucked string.")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plays the string from a MIDI keyboard, or a scripted arpeggio without one.
    Play {
        /// A string configuration file (YAML, TOML or JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Tune the string to this note, e.g. C#3.
        #[arg(short, long)]
        note: Option<Note>,
    },
    /// Renders a single pluck to a WAV file.
    Render {
        /// The WAV file to write.
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        note: Option<Note>,
        /// Seconds before the pinch is released.
        #[arg(long, default_value_t = 1.0)]
        hold: f64,
        /// Total length in seconds.
        #[arg(long, default_value_t = 4.0)]
        duration: f64,
        #[arg(long, default_value_t = 48000)]
        sample_rate: u32,
        /// Pluck intensity; the configured baseline if omitted.
        #[arg(long)]
        intensity: Option<f64>,
        /// Hold the sustain pedal down.
        #[arg(long)]
        pedal: bool,
    },
    /// Prints the tuning and harmonic content of a string.
    Describe {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        note: Option<Note>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { config, note } => {
            let config = load_config(config.as_deref(), note)?;
            play(&config)
        }
        Commands::Render {
            out,
            config,
            note,
            hold,
            duration,
            sample_rate,
            intensity,
            pedal,
        } => {
            let config = load_config(config.as_deref(), note)?;
            let options = RenderOptions {
                sample_rate,
                hold,
                duration,
                pedal,
                intensity,
            };
            let samples = render_pluck(&config, &options)?;
            write_wav(&out, &samples, sample_rate)?;
            println!("Wrote {} samples to {}", samples.len(), out.display());
            Ok(())
        }
        Commands::Describe { config, note } => {
            let config = load_config(config.as_deref(), note)?;
            describe(&config, note)
        }
    }
}

fn load_config(path: Option<&Path>, note: Option<Note>) -> Result<StringConfig, Box<dyn Error>> {
    let config = match path {
        Some(path) => StringConfig::load(path)?,
        None => StringConfig::default(),
    };
    Ok(match note {
        Some(note) => config.with_note(note),
        None => config,
    })
}

fn describe(config: &StringConfig, note: Option<Note>) -> Result<(), Box<dyn Error>> {
    let collector = Collector::new();
    let (mut synth, _voice) = StringSynth::new(config, &collector.handle())?;
    synth.pinch();

    let properties = synth.properties();
    let fundamental = synth.fundamental();
    println!(
        "String: {:.4} m, {:.5} kg/m, {:.1} N",
        properties.length, properties.linear_density, properties.tension
    );
    println!("Fundamental: {:.2} Hz ({})", fundamental, name_from_frequency(fundamental));
    if let Some(note) = note {
        println!("Unison strings for {}: {}", note, string_for_note(note).unisons);
    }
    let envelope = synth.envelope_params();
    println!(
        "Envelope: attack {:.3} s, decay {:.3} s, sustain {:.2}, release {:.2} s",
        envelope.attack, envelope.decay, envelope.sustain, envelope.release
    );
    println!("Harmonics:");
    for (n, (frequency, amplitude)) in synth.frequencies().iter().zip(synth.amplitudes()).enumerate() {
        println!("  {:>2}  {:>9.2} Hz  {:.5}", n + 1, frequency, amplitude);
    }
    Ok(())
}

fn play(config: &StringConfig) -> Result<(), Box<dyn Error>> {
    let mut player = Player::initialize(config)?;
    info!(
        sample_rate = player.sample_rate(),
        offline = player.is_offline(),
        fundamental = player.synth().fundamental(),
        "Ready to play"
    );

    let (midi_tx, midi_rx) = mpsc::channel();
    let _connection = start_midi(midi_tx);

    let mut current: Option<Note> = None;
    let mut last = Instant::now();
    loop {
        while let Ok(event) = midi_rx.try_recv() {
            handle_event(&mut player, &mut current, event);
        }
        let now = Instant::now();
        player.tick(now.duration_since(last).as_secs_f64());
        last = now;
        thread::sleep(TICK);
    }
}

fn handle_event(player: &mut Player, current: &mut Option<Note>, event: MidiEvent) {
    match event {
        MidiEvent::NoteOn { note, velocity, .. } => {
            if let Err(err) = player.set_note(note) {
                warn!(%err, %note, "Cannot tune to note");
                return;
            }
            *current = Some(note);
            player.pinch_with(MidiEvent::intensity(velocity));
        }
        MidiEvent::NoteOff { note, .. } if *current == Some(note) => {
            *current = None;
            player.stop_pinch();
        }
        event => {
            if let Some(pressed) = event.sustain_pedal() {
                player.set_sustain_pedal(pressed);
            }
        }
    }
}

/// Forwards events from the first MIDI input port, or plays an arpeggio if there is none.
fn start_midi(tx: mpsc::Sender<MidiEvent>) -> Option<MidiInputConnection<()>> {
    let midi_in = match MidiInput::new("string-synth input") {
        Ok(mut midi_in) => {
            midi_in.ignore(Ignore::ActiveSense);
            Some(midi_in)
        }
        Err(err) => {
            warn!(%err, "MIDI unavailable");
            None
        }
    };

    if let Some(midi_in) = midi_in {
        if let Some(port) = midi_in.ports().first().cloned() {
            let port_name = midi_in.port_name(&port).unwrap_or_default();
            let sender = tx.clone();
            let callback = move |_, message: &[u8], _: &mut ()| {
                let event = MidiEvent::from_raw(message);
                if event.is_invalid() {
                    return;
                }
                sender.send(event).ok();
            };
            match midi_in.connect(&port, "string-synth-read", callback, ()) {
                Ok(connection) => {
                    info!(port = %port_name, "Listening for MIDI");
                    return Some(connection);
                }
                Err(err) => warn!(%err, "Could not connect to MIDI input"),
            }
        }
    }

    info!("No MIDI input, playing an arpeggio");
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(1000));
        let on = |note: Note| MidiEvent::NoteOn {
            channel: 0,
            note,
            velocity: 100,
        };
        let off = |note: Note| MidiEvent::NoteOff {
            channel: 0,
            note,
            velocity: 0,
        };
        let root = Note(48);
        loop {
            for i in [0, 4, 7, 12, 7, 4] {
                let note = root.transpose(i);
                if tx.send(on(note)).is_err() {
                    return;
                }
                thread::sleep(Duration::from_millis(350));
                tx.send(off(note)).ok();
                thread::sleep(Duration::from_millis(150));
            }
        }
    });
    None
}
