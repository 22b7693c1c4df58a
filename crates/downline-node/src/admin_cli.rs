//! downline-admin CLI tool
//!
//! Sends gateway events and admin commands to a running downline-node.
//!
//! Usage:
//!   downline-admin refresh [code:sponsor_id:uses ...]
//!   downline-admin add-member <member_id> <display_name>
//!   downline-admin seed-root <member_id>
//!   downline-admin join <member_id> <display_name> [code:sponsor_id:uses ...]
//!   downline-admin place <member_id> <display_name> <sponsor_id>
//!   downline-admin invite-created <code> <sponsor_id> <uses>
//!   downline-admin increment-instructed <member_id>
//!   downline-admin decrement-instructed <member_id>
//!   downline-admin tree
//!   downline-admin leaderboard <category>
//!   downline-admin ping

use downline_node::admin_socket::{AdminCommand, AdminResponse};
use downline_tree::InviteRecord;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

fn print_usage() {
    eprintln!("downline-admin - Manage a Downline node");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  downline-admin refresh [code:sponsor:uses...]     Rebuild the hierarchy");
    eprintln!("  downline-admin add-member <id> <name>             Register a member");
    eprintln!("  downline-admin seed-root <id>                     Make a member the root");
    eprintln!("  downline-admin join <id> <name> [code:sponsor:uses...]");
    eprintln!("                                                    Place a new member by invite");
    eprintln!("  downline-admin place <id> <name> <sponsor_id>     Place under a sponsor");
    eprintln!("  downline-admin invite-created <code> <sponsor_id> <uses>");
    eprintln!("  downline-admin increment-instructed <id>");
    eprintln!("  downline-admin decrement-instructed <id>");
    eprintln!("  downline-admin tree                               Print the hierarchy");
    eprintln!("  downline-admin leaderboard <category>             Print one leaderboard");
    eprintln!("                                                    (bfs, downline, instructed,");
    eprintln!("                                                    personally_sponsored)");
    eprintln!("  downline-admin ping                               Check if daemon is running");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DOWNLINE_SOCKET  Path to admin socket (default: ./downline-data/admin.sock)");
}

fn get_socket_path() -> PathBuf {
    std::env::var("DOWNLINE_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./downline-data/admin.sock"))
}

fn send_command(cmd: AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to downline-node at {:?}: {}\n\
             Is the downline-node running?",
            socket_path, e
        )
    })?;

    // Send command
    let cmd_json = serde_json::to_string(&cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    // Read response
    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn parse_invite(raw: &str) -> Result<InviteRecord, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    match parts.as_slice() {
        [code, sponsor, uses] => {
            let uses: u32 = uses
                .parse()
                .map_err(|_| format!("Invalid use count in invite {}", raw))?;
            Ok(InviteRecord::new(*code, *sponsor, uses))
        }
        _ => Err(format!("Invite must be code:sponsor_id:uses, got {}", raw)),
    }
}

fn parse_invites(raw: &[String]) -> Result<Vec<InviteRecord>, String> {
    raw.iter().map(|s| parse_invite(s)).collect()
}

fn parse_command(args: &[String]) -> Result<AdminCommand, String> {
    let arg = |i: usize| {
        args.get(i)
            .cloned()
            .ok_or_else(|| format!("{} requires more arguments", args[0]))
    };

    let cmd = match args[0].as_str() {
        "refresh" if args.len() > 1 => AdminCommand::Refresh {
            invites: Some(parse_invites(&args[1..])?),
        },
        "refresh" => AdminCommand::Refresh { invites: None },
        "add-member" => AdminCommand::AddMember {
            member_id: arg(1)?,
            display_name: arg(2)?,
        },
        "seed-root" => AdminCommand::SeedRoot { member_id: arg(1)? },
        "join" => AdminCommand::MemberJoined {
            member_id: arg(1)?,
            display_name: arg(2)?,
            invites: parse_invites(&args[3.min(args.len())..])?,
        },
        "place" => AdminCommand::Place {
            member_id: arg(1)?,
            display_name: arg(2)?,
            sponsor_id: arg(3)?,
        },
        "invite-created" => AdminCommand::InviteCreated {
            code: arg(1)?,
            sponsor_id: arg(2)?,
            uses: arg(3)?
                .parse::<u32>()
                .map_err(|_| "uses must be a number".to_string())?,
        },
        "increment-instructed" => AdminCommand::IncrementInstructed { member_id: arg(1)? },
        "decrement-instructed" => AdminCommand::DecrementInstructed { member_id: arg(1)? },
        "tree" => AdminCommand::Tree,
        "leaderboard" => AdminCommand::Leaderboard { category: arg(1)? },
        "ping" => AdminCommand::Ping,
        other => return Err(format!("Unknown command: {}", other)),
    };
    Ok(cmd)
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() {
        print_usage();
        std::process::exit(1);
    }

    if matches!(args[0].as_str(), "-h" | "--help" | "help") {
        print_usage();
        std::process::exit(0);
    }

    let cmd = match parse_command(&args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    match send_command(cmd) {
        Ok(response) => match response {
            AdminResponse::Ok { message } => {
                println!("{}", message);
            }
            AdminResponse::Refused { message } => {
                println!("{}", message);
                std::process::exit(2);
            }
            AdminResponse::Error { error } => {
                eprintln!("Error: {}", error);
                std::process::exit(1);
            }
            AdminResponse::List { items } => {
                if items.is_empty() {
                    println!("(none)");
                } else {
                    for item in items {
                        println!("{}", item);
                    }
                }
            }
            AdminResponse::Pong => {
                println!("pong - downline-node is running");
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn join_parses_invites() {
        let cmd = parse_command(&args(&["join", "42", "Ada", "abc:1:3", "def:2:0"])).unwrap();
        match cmd {
            AdminCommand::MemberJoined { invites, .. } => {
                assert_eq!(invites.len(), 2);
                assert_eq!(invites[0], InviteRecord::new("abc", "1", 3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn join_without_invites() {
        let cmd = parse_command(&args(&["join", "42", "Ada"])).unwrap();
        assert!(matches!(cmd, AdminCommand::MemberJoined { invites, .. } if invites.is_empty()));
    }

    #[test]
    fn missing_argument_is_reported() {
        let err = parse_command(&args(&["place", "42", "Ada"])).unwrap_err();
        assert!(err.contains("place"));
    }

    #[test]
    fn malformed_invite_is_reported() {
        assert!(parse_invite("abc:1").is_err());
        assert!(parse_invite("abc:1:x").is_err());
    }

    #[test]
    fn refresh_keeps_invites_unless_given() {
        let cmd = parse_command(&args(&["refresh"])).unwrap();
        assert!(matches!(cmd, AdminCommand::Refresh { invites: None }));

        let cmd = parse_command(&args(&["refresh", "abc:1:3"])).unwrap();
        match cmd {
            AdminCommand::Refresh {
                invites: Some(invites),
            } => assert_eq!(invites, vec![InviteRecord::new("abc", "1", 3)]),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
