use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{self, BufRead, Write};
use std::path::Path;

use time::{OffsetDateTime, format_description};

use crate::state::{Action, joint_action_line};

#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("judge i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("judge closed the connection")]
    Closed,
    #[error("unexpected judge response {line:?}")]
    UnexpectedResponse { line: String },
}

/// Line protocol with the judge: level text in, one joint action per line
/// out, one `true`/`false` verdict back per action.
pub struct JudgeConnection<R: BufRead, W: Write> {
    reader: R,
    writer: W,
    replays_folder: Option<String>,
    replay_file: Option<ReplayFile>,
}

impl<R: BufRead, W: Write> JudgeConnection<R, W> {
    pub fn new(reader: R, writer: W, replays_folder: Option<String>) -> Self {
        Self {
            reader,
            writer,
            replays_folder,
            replay_file: None,
        }
    }

    fn read_line(&mut self) -> Result<Option<String>, JudgeError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Reads level lines up to the blank terminator or end of input.
    pub fn read_level(&mut self) -> Result<String, JudgeError> {
        let mut text = String::new();
        while let Some(line) = self.read_line()? {
            if line.is_empty() {
                break;
            }
            text.push_str(&line);
            text.push('\n');
        }
        if text.is_empty() {
            return Err(JudgeError::Closed);
        }

        if let Some(folder) = &self.replays_folder {
            match ReplayFile::new(folder, &text) {
                Ok(replay) => self.replay_file = Some(replay),
                Err(e) => tracing::warn!(error = %e, "Could not create replay file"),
            }
        }
        Ok(text)
    }

    /// Sends one joint action and returns whether the judge accepted it.
    pub fn act(&mut self, actions: &[Action]) -> Result<bool, JudgeError> {
        let line = joint_action_line(actions);
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;

        let response = self.read_line()?.ok_or(JudgeError::Closed)?;
        let accepted = parse_verdict(&response)?;

        if let Some(replay_file) = &mut self.replay_file {
            replay_file.append(&line, &response)?;
        }
        Ok(accepted)
    }
}

/// Accepts `true`/`false` and the bracketed per-agent form `[true,false]`.
fn parse_verdict(response: &str) -> Result<bool, JudgeError> {
    let inner = response
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    let mut accepted = true;
    for token in inner.split(',') {
        match token.trim() {
            "true" => {}
            "false" => accepted = false,
            _ => {
                return Err(JudgeError::UnexpectedResponse {
                    line: response.to_string(),
                });
            }
        }
    }
    Ok(accepted)
}

struct ReplayFile {
    file: File,
}

impl ReplayFile {
    fn new(replays_folder: &str, level: &str) -> io::Result<Self> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let format = format_description::parse("[year][month][day]-[hour][minute][second]")
            .map_err(io::Error::other)?;
        let date_time_str = now.format(&format).map_err(io::Error::other)?;

        let mut hasher = DefaultHasher::new();
        level.hash(&mut hasher);
        let filename = Path::new(replays_folder)
            .join(format!("sokobot - {} - {:08x}.replay", date_time_str, hasher.finish() as u32));

        if let Some(parent) = filename.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = File::create(filename)?;
        file.write_all(level.as_bytes())?;
        writeln!(file)?;
        file.flush()?;
        Ok(ReplayFile { file })
    }

    fn append(&mut self, action: &str, response: &str) -> io::Result<()> {
        writeln!(self.file, "{} -> {}", action, response)?;
        self.file.flush()
    }
}
