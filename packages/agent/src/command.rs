//! Line commands standing in for the attendance screen.

use field_core::Intent;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Online,
    Offline,
    /// `None` clears the selection.
    Site(Option<String>),
    Ticket(Option<String>),
    Fix { latitude: f64, longitude: f64 },
    Intent { intent: Intent, comment: String },
    Sync,
    Status,
    Sites,
    Logout,
    Quit,
    Help,
}

pub const HELP: &str = "\
commands:
  online | offline            network state
  sites                       list work sites
  site <id|none>              select a site
  ticket <id|none>            select a ticket
  fix <lat> <lon>             report a location fix
  checkin|checkout|pause|resume <comment>
  sync                        run a sync pass now
  status                      attendance and sync counters
  logout | quit";

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "online" => Command::Online,
            "offline" => Command::Offline,
            "sites" => Command::Sites,
            "site" => Command::Site(optional_id(rest, "site")?),
            "ticket" => Command::Ticket(optional_id(rest, "ticket")?),
            "fix" => {
                let mut parts = rest.split_whitespace();
                let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err("usage: fix <lat> <lon>".into());
                };
                Command::Fix {
                    latitude: coordinate(lat)?,
                    longitude: coordinate(lon)?,
                }
            }
            "checkin" => intent(Intent::CheckIn, rest),
            "checkout" => intent(Intent::CheckOut, rest),
            "pause" => intent(Intent::Pause, rest),
            "resume" => intent(Intent::Resume, rest),
            "sync" => Command::Sync,
            "status" => Command::Status,
            "logout" => Command::Logout,
            "quit" | "exit" => Command::Quit,
            "help" | "?" | "" => Command::Help,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(command)
    }
}

// Blank comments are passed through so the state machine reports them.
fn intent(intent: Intent, comment: &str) -> Command {
    Command::Intent {
        intent,
        comment: comment.to_string(),
    }
}

fn optional_id(rest: &str, what: &str) -> Result<Option<String>, String> {
    match rest {
        "" => Err(format!("usage: {what} <id|none>")),
        "none" => Ok(None),
        id => Ok(Some(id.to_string())),
    }
}

fn coordinate(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("not a coordinate: {raw}"))
}
