use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};

use crate::app::state::{Filter, SessionState};
use crate::app::view::{render_all, NoteList, ViewModel};
use crate::app::{Effect, Handlers, SessionGate};

#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// Account email
    pub email: String,
    /// Password (prompted, or read from piped stdin, if omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct NotesArgs {
    /// Only show notes under this tag
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct NoteArgs {
    #[command(subcommand)]
    pub command: NoteCommand,
}

impl NoteArgs {
    pub(crate) fn assume_yes(&self) -> bool {
        matches!(&self.command, NoteCommand::Delete(args) if args.yes)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum NoteCommand {
    /// Create a note
    Add(NoteAddArgs),
    /// Change a note's title, text or tag
    Edit(NoteEditArgs),
    /// Delete a note
    Delete(DeleteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NoteAddArgs {
    /// Note body
    #[arg(long)]
    pub text: String,
    #[arg(long)]
    pub title: Option<String>,
    /// Tag name; the first tag is used when omitted
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct NoteEditArgs {
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub text: Option<String>,
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    pub id: i64,
    /// Skip the confirmation question
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TagArgs {
    #[command(subcommand)]
    pub command: TagCommand,
}

impl TagArgs {
    pub(crate) fn assume_yes(&self) -> bool {
        matches!(&self.command, TagCommand::Delete(args) if args.yes)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TagCommand {
    /// List tags with their ids and colors
    List,
    /// Create a tag
    Add(TagAddArgs),
    /// Rename or recolor a tag; notes follow a rename
    Edit(TagEditArgs),
    /// Delete a tag, moving its notes to the oldest remaining tag
    Delete(DeleteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TagAddArgs {
    pub name: String,
    /// Hex color such as #3b82f6
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TagEditArgs {
    pub id: i64,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
}

pub fn sign_up(gate: SessionGate, args: AuthArgs) -> Result<String> {
    authenticate(gate, args, true)
}

pub fn sign_in(gate: SessionGate, args: AuthArgs) -> Result<String> {
    authenticate(gate, args, false)
}

fn authenticate(mut gate: SessionGate, args: AuthArgs, register: bool) -> Result<String> {
    let password = match args.password {
        Some(password) => password,
        None => read_secret("Password")?,
    };
    let auth = Arc::clone(gate.auth());
    let result = if register {
        auth.sign_up(&args.email, &password)
    } else {
        auth.sign_in(&args.email, &password)
    };
    let user = result.map_err(|err| {
        tracing::debug!(%err, "authentication rejected");
        anyhow!(gate.messages().auth_error(&err))
    })?;
    apply(gate.pump())?;
    Ok(format!("Signed in as {}\n", user.email))
}

pub fn sign_out(mut gate: SessionGate) -> Result<String> {
    gate.pump();
    let Some(user) = gate.user().cloned() else {
        return Ok("Not signed in.\n".to_string());
    };
    gate.auth().sign_out().context("signing out")?;
    gate.pump();
    Ok(format!("Signed out {}\n", user.email))
}

pub fn whoami(mut gate: SessionGate) -> Result<String> {
    gate.pump();
    Ok(match gate.user() {
        Some(user) => format!("{}\n", user.email),
        None => "Not signed in.\n".to_string(),
    })
}

pub fn list_notes(gate: SessionGate, args: NotesArgs) -> Result<String> {
    let mut gate = open_workspace(gate)?;
    if let Some(tag) = args.tag {
        require_tag(gate.state(), &tag)?;
        run(&mut gate, |handlers, state| {
            handlers.set_filter(state, Filter::Tag(tag))
        })?;
    }
    Ok(format_notes(&current_view(&gate)))
}

pub fn handle_note_command(gate: SessionGate, args: NoteArgs) -> Result<String> {
    let mut gate = open_workspace(gate)?;
    match args.command {
        NoteCommand::Add(args) => note_add(&mut gate, args),
        NoteCommand::Edit(args) => note_edit(&mut gate, args),
        NoteCommand::Delete(args) => note_delete(&mut gate, args),
    }
}

pub fn handle_tag_command(gate: SessionGate, args: TagArgs) -> Result<String> {
    let mut gate = open_workspace(gate)?;
    match args.command {
        TagCommand::List => Ok(format_tags(&current_view(&gate))),
        TagCommand::Add(args) => tag_add(&mut gate, args),
        TagCommand::Edit(args) => tag_edit(&mut gate, args),
        TagCommand::Delete(args) => tag_delete(&mut gate, args),
    }
}

fn note_add(gate: &mut SessionGate, args: NoteAddArgs) -> Result<String> {
    if let Some(tag) = &args.tag {
        require_tag(gate.state(), tag)?;
    }
    run(gate, |handlers, state| {
        state.cancel_note_edit();
        state.note_draft.title = args.title.unwrap_or_default();
        state.note_draft.text = args.text;
        state.note_draft.tag_name = args.tag.unwrap_or_default();
        handlers.save_note(state)
    })?;
    Ok("Note saved.\n".to_string())
}

fn note_edit(gate: &mut SessionGate, args: NoteEditArgs) -> Result<String> {
    if let Some(tag) = &args.tag {
        require_tag(gate.state(), tag)?;
    }
    let id = args.id;
    run(gate, |handlers, state| handlers.begin_edit_note(state, id))?;
    run(gate, |handlers, state| {
        let draft = &mut state.note_draft;
        if let Some(title) = args.title {
            draft.title = title;
        }
        if let Some(text) = args.text {
            draft.text = text;
        }
        if let Some(tag) = args.tag {
            draft.tag_name = tag;
        }
        handlers.save_note(state)
    })?;
    Ok(format!("Note #{id} updated.\n"))
}

fn note_delete(gate: &mut SessionGate, args: DeleteArgs) -> Result<String> {
    let id = args.id;
    let effects = run(gate, |handlers, state| handlers.delete_note(state, id))?;
    if effects.is_empty() {
        return Ok(format!("Kept note #{id}.\n"));
    }
    Ok(format!("Deleted note #{id}.\n"))
}

fn tag_add(gate: &mut SessionGate, args: TagAddArgs) -> Result<String> {
    let name = args.name.trim().to_string();
    run(gate, |handlers, state| {
        state.cancel_tag_edit();
        state.tag_draft.name = args.name;
        if let Some(color) = args.color {
            state.tag_draft.color = color;
        }
        handlers.save_tag(state)
    })?;
    Ok(format!("Tag \"{name}\" created.\n"))
}

fn tag_edit(gate: &mut SessionGate, args: TagEditArgs) -> Result<String> {
    let id = args.id;
    run(gate, |handlers, state| handlers.begin_edit_tag(state, id))?;
    run(gate, |handlers, state| {
        if let Some(name) = args.name {
            state.tag_draft.name = name;
        }
        if let Some(color) = args.color {
            state.tag_draft.color = color;
        }
        handlers.save_tag(state)
    })?;
    Ok(format!("Tag #{id} updated.\n"))
}

fn tag_delete(gate: &mut SessionGate, args: DeleteArgs) -> Result<String> {
    let id = args.id;
    let effects = run(gate, |handlers, state| handlers.delete_tag(state, id))?;
    if effects.is_empty() {
        return Ok(format!("Kept tag #{id}.\n"));
    }
    Ok(format!("Deleted tag #{id}.\n"))
}

/// Processes the remembered session and fails unless someone is signed in.
fn open_workspace(mut gate: SessionGate) -> Result<SessionGate> {
    let effects = gate.pump();
    if gate.user().is_none() {
        bail!("not signed in; run `tagnotes login <email>` first");
    }
    apply(effects)?;
    Ok(gate)
}

fn run<F>(gate: &mut SessionGate, f: F) -> Result<Vec<Effect>>
where
    F: FnOnce(&Handlers, &mut SessionState) -> Vec<Effect>,
{
    let effects = gate
        .dispatch(f)
        .context("not signed in; run `tagnotes login <email>` first")?;
    apply(effects)
}

/// Alerts and busy notices become errors; everything else is passed back.
fn apply(effects: Vec<Effect>) -> Result<Vec<Effect>> {
    let alerts: Vec<&str> = effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Alert(message) => Some(message.as_str()),
            _ => None,
        })
        .collect();
    if !alerts.is_empty() {
        bail!("{}", alerts.join("\n"));
    }
    if let Some(Effect::Busy(key)) = effects.iter().find(|e| matches!(e, Effect::Busy(_))) {
        bail!("{key} is busy");
    }
    Ok(effects)
}

fn require_tag(state: &SessionState, name: &str) -> Result<()> {
    if state.tag_by_name(name).is_none() {
        bail!("unknown tag \"{name}\"; see `tagnotes tag list`");
    }
    Ok(())
}

fn current_view(gate: &SessionGate) -> ViewModel {
    render_all(gate.state(), gate.messages())
}

fn format_notes(view: &ViewModel) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "{}", view.filter_menu.label);
    match &view.notes {
        NoteList::Empty(message) => {
            let _ = writeln!(&mut out, "{message}");
        }
        NoteList::Cards(cards) => {
            for card in cards {
                let _ = writeln!(&mut out, "#{}  {}", card.id, card.title);
                let _ = writeln!(
                    &mut out,
                    "    {}  {}  {}",
                    card.tag_name, card.color, card.created_label
                );
                for line in card.text.lines() {
                    let _ = writeln!(&mut out, "    {line}");
                }
            }
        }
    }
    out
}

fn format_tags(view: &ViewModel) -> String {
    if view.manageable_tags.is_empty() {
        return match &view.tag_select.placeholder {
            Some(placeholder) => format!("{placeholder}\n"),
            None => String::new(),
        };
    }
    let mut out = String::new();
    for tag in &view.manageable_tags {
        let _ = writeln!(&mut out, "#{:<4} {}  {}", tag.id, tag.color, tag.name);
    }
    out
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

/// Reads one line from piped stdin, or asks on the terminal.
fn read_secret(label: &str) -> Result<String> {
    if atty::is(atty::Stream::Stdin) {
        return prompt(label);
    }
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::prompt::AnsweredPrompt;
    use crate::cli::build_gate;
    use crate::config::{AppConfig, ConfigPaths};
    use crate::storage::test_support::init_storage;
    use crate::storage::StorageHandle;

    type TestResult<T = ()> = Result<T>;

    struct Env {
        _temp: tempfile::TempDir,
        paths: ConfigPaths,
        storage: StorageHandle,
    }

    impl Env {
        fn new() -> TestResult<Self> {
            let (temp, paths, storage) = init_storage()?;
            Ok(Self {
                _temp: temp,
                paths,
                storage,
            })
        }

        /// A fresh gate per call, like separate CLI invocations.
        fn gate(&self, answer: bool) -> SessionGate {
            build_gate(&AppConfig::default(), &self.paths, self.storage.clone())
                .with_prompt(Arc::new(AnsweredPrompt::new(answer)))
        }

        fn signed_up(self) -> TestResult<Self> {
            sign_up(
                self.gate(true),
                AuthArgs {
                    email: "ana@example.com".into(),
                    password: Some("secret1".into()),
                },
            )?;
            Ok(self)
        }

        fn add_note(&self, text: &str, tag: Option<&str>) -> TestResult<String> {
            handle_note_command(
                self.gate(true),
                NoteArgs {
                    command: NoteCommand::Add(NoteAddArgs {
                        text: text.into(),
                        title: None,
                        tag: tag.map(str::to_string),
                    }),
                },
            )
        }

        fn notes(&self, tag: Option<&str>) -> TestResult<String> {
            list_notes(
                self.gate(true),
                NotesArgs {
                    tag: tag.map(str::to_string),
                },
            )
        }

        fn tag(&self, command: TagCommand) -> TestResult<String> {
            handle_tag_command(self.gate(true), TagArgs { command })
        }
    }

    #[test]
    fn session_is_remembered_between_invocations() -> TestResult {
        let env = Env::new()?.signed_up()?;
        assert_eq!(whoami(env.gate(true))?, "ana@example.com\n");

        let listed = env.notes(None)?;
        assert!(listed.contains("All notes"));
        assert!(listed.contains("No notes yet"));

        sign_out(env.gate(true))?;
        assert_eq!(whoami(env.gate(true))?, "Not signed in.\n");
        let err = env.notes(None).unwrap_err();
        assert!(err.to_string().contains("not signed in"));
        Ok(())
    }

    #[test]
    fn login_reports_bad_credentials() -> TestResult {
        let env = Env::new()?.signed_up()?;
        sign_out(env.gate(true))?;
        let err = sign_in(
            env.gate(true),
            AuthArgs {
                email: "ana@example.com".into(),
                password: Some("wrong-password".into()),
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Incorrect email or password.");

        let ok = sign_in(
            env.gate(true),
            AuthArgs {
                email: "  ANA@example.com ".into(),
                password: Some("secret1".into()),
            },
        )?;
        assert_eq!(ok, "Signed in as ana@example.com\n");
        Ok(())
    }

    #[test]
    fn notes_filter_by_tag_and_reject_unknown_tags() -> TestResult {
        let env = Env::new()?.signed_up()?;
        env.add_note("finish report", Some("Work"))?;
        env.add_note("call mom", Some("Family"))?;

        let work = env.notes(Some("Work"))?;
        assert!(work.starts_with("Tag: Work"));
        assert!(work.contains("finish report"));
        assert!(!work.contains("call mom"));

        let err = env.notes(Some("Hobby")).unwrap_err();
        assert!(err.to_string().contains("unknown tag"));
        let err = env.add_note("   ", None).unwrap_err();
        assert_eq!(err.to_string(), "Note text cannot be empty.");
        Ok(())
    }

    #[test]
    fn tag_rename_relabels_notes() -> TestResult {
        let env = Env::new()?.signed_up()?;
        env.add_note("standup", Some("Work"))?;
        let listed = env.tag(TagCommand::List)?;
        let work_id: i64 = listed
            .lines()
            .find(|line| line.ends_with("Work"))
            .and_then(|line| line.trim_start_matches('#').split_whitespace().next())
            .context("work tag listed")?
            .parse()?;

        env.tag(TagCommand::Edit(TagEditArgs {
            id: work_id,
            name: Some("Job".into()),
            color: None,
        }))?;

        let job = env.notes(Some("Job"))?;
        assert!(job.contains("standup"));
        assert!(env.notes(Some("Work")).is_err());

        let err = env
            .tag(TagCommand::Add(TagAddArgs {
                name: "job".into(),
                color: None,
            }))
            .unwrap_err();
        assert_eq!(err.to_string(), "This tag already exists.");
        Ok(())
    }

    #[test]
    fn declined_delete_keeps_the_note() -> TestResult {
        let env = Env::new()?.signed_up()?;
        env.add_note("keep me", None)?;
        let listed = env.notes(None)?;
        let id: i64 = listed
            .lines()
            .find_map(|line| line.strip_prefix('#'))
            .and_then(|rest| rest.split_whitespace().next())
            .context("note listed")?
            .parse()?;

        let kept = handle_note_command(
            env.gate(false),
            NoteArgs {
                command: NoteCommand::Delete(DeleteArgs { id, yes: false }),
            },
        )?;
        assert_eq!(kept, format!("Kept note #{id}.\n"));
        assert!(env.notes(None)?.contains("keep me"));

        handle_note_command(
            env.gate(true),
            NoteArgs {
                command: NoteCommand::Delete(DeleteArgs { id, yes: true }),
            },
        )?;
        assert!(!env.notes(None)?.contains("keep me"));
        Ok(())
    }
}
