//! Unix socket server for admin commands and gateway events.
//!
//! One JSON command per line in, one JSON response per line out.

use crate::error::Result;
use crate::node::SharedRegistry;
use downline_tree::{AdjustOutcome, Adjustment, Category, InviteRecord, MemberId, Placement};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Command sent over the socket.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Rebuild the hierarchy from storage; `invites` replaces the invite
    /// cache when present
    Refresh {
        #[serde(default)]
        invites: Option<Vec<InviteRecord>>,
    },
    /// Register a member in storage without placing them
    AddMember { member_id: String, display_name: String },
    /// Make a registered member the root of an empty community
    SeedRoot { member_id: String },
    /// A member joined; resolve the sponsor from invite use counts
    MemberJoined {
        member_id: String,
        display_name: String,
        #[serde(default)]
        invites: Vec<InviteRecord>,
    },
    /// Place a member under an explicit sponsor
    Place {
        member_id: String,
        display_name: String,
        sponsor_id: String,
    },
    /// An invite code was created
    InviteCreated { code: String, sponsor_id: String, uses: u32 },
    /// Increment a member's Instructed count
    IncrementInstructed { member_id: String },
    /// Decrement a member's Instructed count
    DecrementInstructed { member_id: String },
    /// Text outline of the tree
    Tree,
    /// Leaderboard lines for one category
    Leaderboard { category: String },
    /// Ping (health check)
    Ping,
}

/// Response from an admin command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Refused { message: String },
    Error { error: String },
    List { items: Vec<String> },
    Pong,
}

impl AdminResponse {
    fn error(e: impl ToString) -> Self {
        AdminResponse::Error {
            error: e.to_string(),
        }
    }
}

/// Admin socket server.
pub struct AdminSocket {
    registry: SharedRegistry,
    socket_path: PathBuf,
}

impl AdminSocket {
    /// Create a new admin socket server.
    pub fn new(registry: SharedRegistry, socket_path: &Path) -> Self {
        Self {
            registry,
            socket_path: socket_path.to_path_buf(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // Remove existing socket file if present
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let registry = SharedRegistry::clone(&self.registry);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, registry).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, registry: SharedRegistry) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &registry).await,
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

fn adjust_response(member_id: &str, outcome: AdjustOutcome, verb: &str) -> AdminResponse {
    match outcome {
        AdjustOutcome::Applied { current, .. } => {
            tracing::info!("Instructed {} to {} for {}", verb, current, member_id);
            AdminResponse::Ok {
                message: format!("Instructed {} to {}!", verb, current),
            }
        }
        AdjustOutcome::Refused { reason } => AdminResponse::Refused {
            message: reason.to_string(),
        },
    }
}

fn placed_response(display_name: &str, placement: &Placement) -> AdminResponse {
    AdminResponse::Ok {
        message: format!(
            "Placed {} under {} at level {}",
            display_name, placement.sponsor, placement.level
        ),
    }
}

/// Execute one command while holding the registry lock.
pub async fn execute_command(cmd: AdminCommand, registry: &SharedRegistry) -> AdminResponse {
    let mut registry = registry.lock().await;

    match cmd {
        AdminCommand::Refresh { invites } => {
            tracing::info!("Refreshing server data...");
            match registry.refresh(invites) {
                Ok(summary) => AdminResponse::Ok {
                    message: format!(
                        "Server data refreshed! {} members, {} inconsistencies",
                        summary.members, summary.inconsistencies
                    ),
                },
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::AddMember {
            member_id,
            display_name,
        } => match registry
            .store()
            .add_member(&MemberId::from(member_id.as_str()), &display_name)
        {
            Ok(_) => AdminResponse::Ok {
                message: format!("Added member: {}", member_id),
            },
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::SeedRoot { member_id } => {
            match registry.seed_root(&MemberId::from(member_id.as_str())) {
                Ok(_) => AdminResponse::Ok {
                    message: format!("Seeded root: {}", member_id),
                },
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::MemberJoined {
            member_id,
            display_name,
            invites,
        } => {
            let id = MemberId::from(member_id.as_str());
            let checked = registry
                .resolve_sponsor(&invites)
                .and_then(|sponsor| registry.check_placement(&id, &sponsor));
            if let Err(e) = checked {
                return AdminResponse::error(e);
            }
            if let Err(e) = registry.store().add_member(&id, &display_name) {
                return AdminResponse::error(e);
            }
            match registry.member_joined(id, &display_name, &invites) {
                Ok(placement) => placed_response(&display_name, &placement),
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::Place {
            member_id,
            display_name,
            sponsor_id,
        } => {
            let id = MemberId::from(member_id.as_str());
            let sponsor = MemberId::from(sponsor_id.as_str());
            if let Err(e) = registry.check_placement(&id, &sponsor) {
                return AdminResponse::error(e);
            }
            if let Err(e) = registry.store().add_member(&id, &display_name) {
                return AdminResponse::error(e);
            }
            match registry.place(id, &display_name, sponsor) {
                Ok(placement) => placed_response(&display_name, &placement),
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::InviteCreated {
            code,
            sponsor_id,
            uses,
        } => {
            registry.invite_created(InviteRecord::new(code.as_str(), sponsor_id.as_str(), uses));
            AdminResponse::Ok {
                message: format!("Tracking invite {}", code),
            }
        }

        AdminCommand::IncrementInstructed { member_id } => {
            let id = MemberId::from(member_id.as_str());
            match registry.adjust_instructed(&id, Adjustment::Increment) {
                Ok(outcome) => adjust_response(&member_id, outcome, "incremented"),
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::DecrementInstructed { member_id } => {
            let id = MemberId::from(member_id.as_str());
            match registry.adjust_instructed(&id, Adjustment::Decrement) {
                Ok(outcome) => adjust_response(&member_id, outcome, "decremented"),
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::Tree => match registry.outline() {
            Ok(outline) => AdminResponse::List {
                items: outline.lines().map(str::to_string).collect(),
            },
            Err(e) => AdminResponse::error(e),
        },

        AdminCommand::Leaderboard { category } => {
            let Some(category) = Category::parse(&category) else {
                return AdminResponse::error(format!("Unknown category: {}", category));
            };
            match registry.leaderboard(category) {
                Ok(board) => AdminResponse::List {
                    items: board.lines(),
                },
                Err(e) => AdminResponse::error(e),
            }
        }

        AdminCommand::Ping => AdminResponse::Pong,
    }
}
