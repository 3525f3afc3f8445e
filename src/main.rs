use std::env;

use pinto_relay::{peer, server};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "server" => {
                println!("Starting signaling relay...");
                if let Err(e) = server::main() {
                    println!("Server error:\n{}", e);
                }
            }
            "peer" => {
                println!("Starting signaling peer...");
                match peer::main(&args[2..]) {
                    Ok(_) => println!("Peer completed successfully"),
                    Err(e) => println!("Peer error:\n{}", e),
                }
            }
            _ => {
                print_usage();
            }
        }
    } else {
        print_usage();
    }
}

fn print_usage() {
    println!("Pinto Relay");
    println!("Usage:");
    println!("  cargo run server                       - Start the signaling relay");
    println!("  cargo run peer [server-url] [peer-id]  - Start a signaling peer");
}
