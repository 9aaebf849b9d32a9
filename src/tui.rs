#![cfg(feature = "tui")]

use crate::client::{Conversation, ConversationClient};
use crate::conversation::{ModelChoice, Role};
use anyhow::Context;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Terminal;
use std::io;
use tokio::sync::mpsc;

const HELP: &str = "Type a question and press Enter. Commands: /quit, /clear, /stop, /model <chatgpt|gemini>";

pub async fn run_tui(client: ConversationClient) -> anyhow::Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alt screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel::<Event>();
    std::thread::spawn(move || {
        while let Ok(ev) = crossterm::event::read() {
            if ev_tx.send(ev).is_err() {
                break;
            }
        }
    });

    let mut input = String::new();
    let mut notice = HELP.to_string();
    let mut updates = client.subscribe();
    let mut dirty = true;

    // Redraws are capped at the tick rate; fragments arriving in between are
    // folded into the next frame.
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(33));

    let res = loop {
        tokio::select! {
            _ = ticker.tick() => {
                if dirty {
                    if let Err(e) = draw(&mut terminal, &client.snapshot(), &notice, &input) {
                        break Err(e);
                    }
                    dirty = false;
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                dirty = true;
            }
            Some(ev) = ev_rx.recv() => {
                match ev {
                    Event::Key(key) => {
                        if handle_key(key, &mut input, &mut notice, &client) {
                            break Ok(());
                        }
                        dirty = true;
                    }
                    Event::Resize(_, _) => dirty = true,
                    _ => {}
                }
            }
        }
    };

    client.cancel();
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

/// Returns true when the UI should exit.
fn handle_key(key: KeyEvent, input: &mut String, notice: &mut String, client: &ConversationClient) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }

    match key.code {
        KeyCode::Esc => return true,
        KeyCode::Char(c) => input.push(c),
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Enter => {
            let msg = input.trim().to_string();
            input.clear();
            if msg.is_empty() {
                return false;
            }

            if msg == "/quit" {
                return true;
            }
            if msg == "/clear" {
                let model = client.snapshot().model();
                client.switch_model(model);
                *notice = HELP.to_string();
                return false;
            }
            if msg == "/stop" {
                *notice = if client.cancel() {
                    "stopped".to_string()
                } else {
                    "nothing to stop".to_string()
                };
                return false;
            }
            if let Some(rest) = msg.strip_prefix("/model ") {
                match rest.parse::<ModelChoice>() {
                    Ok(model) => {
                        client.switch_model(model);
                        *notice = format!("model set to: {model} (history cleared)");
                    }
                    Err(e) => *notice = e.to_string(),
                }
                return false;
            }

            if client.snapshot().is_in_flight() {
                *notice = "(streaming in progress; wait for completion or /stop)".to_string();
                return false;
            }

            let client = client.clone();
            tokio::spawn(async move {
                // Failures are already written into the transcript.
                if let Err(e) = client.submit(&msg).await {
                    tracing::debug!(error = %e, "turn ended with error");
                }
            });
        }
        _ => {}
    }

    false
}

fn draw<B: Backend>(
    terminal: &mut Terminal<B>,
    convo: &Conversation,
    notice: &str,
    input: &str,
) -> anyhow::Result<()> {
    terminal.draw(|f| {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(1), Constraint::Length(3)])
            .split(f.area());

        let banner = match convo.error() {
            Some(err) => Line::styled(err.to_string(), Style::default().add_modifier(Modifier::BOLD)),
            None => Line::from(notice.to_string()),
        };

        let mut text = Text::default();
        for m in convo.messages() {
            let style = match m.role {
                Role::User => Style::default().add_modifier(Modifier::BOLD),
                _ => Style::default(),
            };
            let marker = if convo.streaming_target() == Some(m.id) { " …" } else { "" };
            text.lines.push(Line::styled(format!("{}:{marker}", m.role), style));
            text.lines.extend(Text::from(m.content.clone()).lines);
            text.lines.push(Line::from(""));
        }

        // Keep the newest lines in view.
        let visible = chunks[1].height.saturating_sub(2) as usize;
        let scroll = text.lines.len().saturating_sub(visible) as u16;

        let title = if convo.is_in_flight() {
            format!("codechat — model: {} (answering)", convo.model())
        } else {
            format!("codechat — model: {}", convo.model())
        };
        let chat = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title(title))
            .scroll((scroll, 0));

        let input_w = Paragraph::new(input.to_string())
            .block(Block::default().borders(Borders::ALL).title("input"))
            .wrap(Wrap { trim: false });

        f.render_widget(Paragraph::new(banner), chunks[0]);
        f.render_widget(chat, chunks[1]);
        f.render_widget(input_w, chunks[2]);

        let x = chunks[2].x + 1 + input.chars().count() as u16;
        let y = chunks[2].y + 1;
        f.set_cursor_position((x.min(chunks[2].x + chunks[2].width.saturating_sub(2)), y));
    })?;
    Ok(())
}
