//! Shared line reader over standard input.
//!
//! The chat loop and the [`TerminalApprover`](crate::approval::TerminalApprover)
//! both read operator input. They take turns on one buffered reader so a
//! line is never split between them, and an approval question always gets
//! the next line: a prompt read in progress gives way as soon as an
//! approval starts waiting and resumes once it has been answered.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::{watch, Mutex};

use crate::Result;

type InputLines = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

/// Cloneable handle to the operator's input lines.
#[derive(Clone)]
pub struct Console {
    lines: Arc<Mutex<InputLines>>,
    answers_waiting: Arc<watch::Sender<usize>>,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("answers_waiting", &*self.answers_waiting.borrow())
            .finish_non_exhaustive()
    }
}

impl Console {
    /// Wrap the process's standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    /// Read operator input from any byte source.
    #[must_use]
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        let (answers_waiting, _) = watch::channel(0);
        Self {
            lines: Arc::new(Mutex::new(BufReader::new(reader).lines())),
            answers_waiting: Arc::new(answers_waiting),
        }
    }

    /// Read the next prompt line; `None` at end of input.
    ///
    /// Yields to [`Console::next_answer`] while an approval is waiting.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if reading the input fails.
    pub async fn next_line(&self) -> Result<Option<String>> {
        let mut waiting = self.answers_waiting.subscribe();
        loop {
            if waiting.wait_for(|n| *n == 0).await.is_err() {
                return Ok(None);
            }
            let mut lines = self.lines.lock().await;
            tokio::select! {
                biased;

                changed = waiting.wait_for(|n| *n > 0) => {
                    if changed.is_err() {
                        return Ok(None);
                    }
                }
                // `next_line` is cancel-safe: a partly read line stays buffered.
                line = lines.next_line() => return Ok(line?),
            }
        }
    }

    /// Read the operator's answer to an approval question.
    ///
    /// Takes precedence over any prompt read in progress.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if reading the input fails.
    pub async fn next_answer(&self) -> Result<Option<String>> {
        let _waiting = AnswerWaiting::register(&self.answers_waiting);
        Ok(self.lines.lock().await.next_line().await?)
    }
}

/// Marks one approval as waiting for input until dropped.
struct AnswerWaiting<'a>(&'a watch::Sender<usize>);

impl<'a> AnswerWaiting<'a> {
    fn register(count: &'a watch::Sender<usize>) -> Self {
        count.send_modify(|n| *n += 1);
        Self(count)
    }
}

impl Drop for AnswerWaiting<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}
