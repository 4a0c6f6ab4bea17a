use std::env;
use std::process;

use cantus::{Event, Sequencer};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: cantus <snapshot.json>");
        process::exit(1);
    }

    let sequencer = match Sequencer::load(&args[1]) {
        Ok(sequencer) => sequencer,
        Err(e) => {
            eprintln!("Error loading snapshot '{}': {}", args[1], e);
            process::exit(1);
        }
    };

    for assignment in sequencer.instruments() {
        println!(
            "channel {} -> program {} bank {}",
            assignment.channel, assignment.instrument.program, assignment.instrument.bank
        );
    }

    for (time_ms, events) in sequencer.score().iter() {
        for event in events {
            match event {
                Event::StartNote {
                    channel,
                    note,
                    velocity,
                } => println!(
                    "{time_ms} ms  start note {} velocity {} channel {}",
                    note.pitch_or_key(),
                    velocity,
                    channel
                ),
                Event::EndNote { channel, note } => println!(
                    "{time_ms} ms  stop note {} channel {}",
                    note.pitch_or_key(),
                    channel
                ),
                Event::ControlChange {
                    channel,
                    control,
                    value,
                } => println!(
                    "{time_ms} ms  control {} = {} channel {}",
                    control.number(),
                    value,
                    channel
                ),
            }
        }
    }
}
