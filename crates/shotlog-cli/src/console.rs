use std::io::Write;
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::thread;
use std::time::Duration;

use shotlog_core::models::Record;
use shotlog_core::resolve::{
    GUIDED_QUESTIONS, ManualEntry, Resolver, ReviewAction, merge_tags,
};

const INPUT_TIMEOUT_SECS: u64 = 30;
const NEIGHBOR_DISPLAY_LIMIT: usize = 5;

/// Attended resolver backed by a background stdin reader. Every prompt is
/// timed; when the operator stays silent the documented default applies, so
/// an abandoned terminal session still drains its queue.
pub struct ConsoleResolver {
    lines: Receiver<String>,
    timeout: Duration,
}

impl ConsoleResolver {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if sender.send(line.trim_end().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self {
            lines: receiver,
            timeout: Duration::from_secs(INPUT_TIMEOUT_SECS),
        }
    }

    fn prompt(&self, text: &str, default: &str) -> String {
        print!("{text}");
        let _ = std::io::stdout().flush();
        match self.lines.recv_timeout(self.timeout) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    default.to_string()
                } else {
                    trimmed.to_string()
                }
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                println!();
                println!(
                    "no input after {INPUT_TIMEOUT_SECS}s, using default '{default}'"
                );
                default.to_string()
            }
        }
    }

    fn prompt_yes_no(&self, text: &str, default_yes: bool) -> bool {
        let default = if default_yes { "y" } else { "n" };
        let answer = self.prompt(text, default).to_lowercase();
        if default_yes {
            !answer.starts_with('n')
        } else {
            answer.starts_with('y')
        }
    }
}

impl Default for ConsoleResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for ConsoleResolver {
    fn is_interactive(&self) -> bool {
        true
    }

    fn choose_action(&mut self, record_id: &str, confidence: f64) -> ReviewAction {
        println!();
        println!("{record_id}: confidence {confidence:.2} needs review");
        println!("  [1] skip for now (defer)");
        println!("  [2] retry with nearby context");
        println!("  [3] enter tags manually");
        match self.prompt("choice [2]: ", "2").as_str() {
            "1" => ReviewAction::Skip,
            "3" => ReviewAction::Manual,
            _ => ReviewAction::Retry,
        }
    }

    fn confirm_retry(
        &mut self,
        record_id: &str,
        neighbors: &[&Record],
        suggested_tags: &[String],
    ) -> bool {
        if neighbors.is_empty() {
            println!("no nearby screenshots found for {record_id}");
        } else {
            println!("nearby screenshots for context:");
            for neighbor in neighbors.iter().take(NEIGHBOR_DISPLAY_LIMIT) {
                let captured = neighbor.captured_at.as_deref().unwrap_or("unknown time");
                println!("  {} [{}] tags: {}", neighbor.id, captured, neighbor.tags.join(", "));
            }
            if neighbors.len() > NEIGHBOR_DISPLAY_LIMIT {
                println!("  ... and {} more", neighbors.len() - NEIGHBOR_DISPLAY_LIMIT);
            }
        }
        if !suggested_tags.is_empty() {
            println!("suggested tags from neighbors: {}", suggested_tags.join(", "));
        }
        self.prompt_yes_no("retry with this context? [Y/n]: ", true)
    }

    fn manual_entry(&mut self, record_id: &str, suggested_tags: &[String]) -> ManualEntry {
        println!();
        println!("manual entry for {record_id}");

        let mut adopted: Vec<String> = Vec::new();
        if !suggested_tags.is_empty() {
            println!("suggested tags: {}", suggested_tags.join(", "));
            if self.prompt_yes_no("include suggested tags? [Y/n]: ", true) {
                adopted.extend_from_slice(suggested_tags);
            }
        }

        let mut guided: Vec<String> = Vec::new();
        for (question, tag) in GUIDED_QUESTIONS {
            if self.prompt_yes_no(&format!("{question} [y/N]: "), false) {
                guided.push(tag.to_string());
            }
        }

        let free_form = self.prompt("additional tags (comma separated): ", "");
        let extra: Vec<String> = free_form
            .split(',')
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        let summary = self.prompt("one-line summary: ", "");

        ManualEntry {
            tags: merge_tags(&[&adopted, &guided, &extra]),
            summary,
        }
    }

    fn confirm_continue(&mut self) -> bool {
        self.prompt_yes_no("continue with the next batch? [Y/n]: ", true)
    }
}
