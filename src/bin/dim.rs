//! The `dim` binary: wires the library to a real `x11rb` connection, a
//! `tracing` subscriber, a TOML config file, and the control-message CLI.
//!
//! Argument parsing, logging initialization, and config loading live here
//! in the binary rather than in the library, which stays free of any
//! dependency on a particular CLI or config format.
use std::collections::HashMap;

use clap::{Parser, Subcommand};
use dim::backend::x11rb::X11rbConnection;
use dim::bindings::{BindingNode, Bindings, ButtonState, ChordKey, KeyCode, ModMask, MouseButton};
use dim::config::Config;
use dim::connection::Connection;
use dim::manager::{Action, Manager};
use dim::property::Property;
use dim::xid::Xid;

#[derive(Parser, Debug)]
#[command(name = "dim", about = "A reparenting X11 window manager")]
struct Cli {
    /// Path to a TOML config file. Missing file falls back to built-in defaults.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// X display name; defaults to $DISPLAY.
    #[arg(long)]
    display: Option<String>,

    #[command(subcommand)]
    command: Option<Control>,
}

/// The remote-control contract. Each variant is a one-shot message sent to
/// an already-running manager over a short-lived second connection; the
/// sender then exits without entering the event loop.
#[derive(Subcommand, Debug)]
enum Control {
    /// Evaluate SPEC against current clients and switch the visible tagset.
    Tagset { spec: String },
    /// Ask the running manager to exit gracefully.
    Exit,
    /// Touch WM_COMMAND and ask the manager to re-exec itself.
    Restart,
    /// Replace WM_COMMAND with ARGV, then ask the manager to exec it in place.
    Exec { argv: Vec<String> },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dim=info".parse().unwrap()))
        .init();
}

fn connect(display: Option<&str>) -> dim::Result<X11rbConnection<x11rb::rust_connection::RustConnection>> {
    let (conn, screen_idx) = x11rb::connect(display)
        .map_err(|e| dim::Error::Protocol(format!("failed to connect to X server: {e}")))?;
    X11rbConnection::connect(conn, screen_idx)
}

/// Send a control message to an already-running manager and exit 0 on
/// success, non-zero on a parse or protocol failure. The manager itself
/// never treats a bad control message as fatal.
fn run_control(control: Control, display: Option<&str>) -> std::process::ExitCode {
    let conn = match connect(display) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("dim: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };
    if let Err(e) = conn.select_root_property_events() {
        eprintln!("dim: failed to watch root properties: {e}");
        return std::process::ExitCode::FAILURE;
    }

    let result = (|| -> dim::Result<()> {
        let root = conn.root();
        let exit_atom = conn.intern_atom("_DIM_WM_EXIT")?;
        let wm_command = conn.intern_atom("WM_COMMAND")?;

        match control {
            Control::Tagset { spec } => {
                // Parsing here is only a fail-fast sanity check; the manager re-parses against its own client
                // set when it receives the update.
                dim::tags::parse(&spec)?;
                let expr_atom = conn.intern_atom("_DIM_TAGSET_EXPRESSION")?;
                let update_atom = conn.intern_atom("_DIM_TAGSET_UPDATE")?;
                conn.set_property(root, expr_atom, &Property::Utf8String(spec))?;
                conn.flush()?;
                conn.send_client_message(root, update_atom, [0; 5])?;
            }
            Control::Exit => {
                conn.send_client_message(root, exit_atom, [0, 0, 0, 0, 0])?;
            }
            Control::Restart => {
                // Touch WM_COMMAND with no argv so the manager's exit handler takes the
                // empty-WM_COMMAND self-restart path and re-execs its own argv, not this
                // control process's. The write only exists to produce a PropertyNotify
                // whose timestamp backs the exit message.
                conn.set_property(root, wm_command, &Property::WmCommand(Vec::new()))?;
                conn.flush()?;
                let timestamp = await_property_notify(&conn, wm_command)?;
                conn.send_client_message(root, exit_atom, [timestamp, 0, 0, 0, 0])?;
            }
            Control::Exec { argv } => {
                if argv.is_empty() {
                    return Err(dim::Error::TagsetParse("--exec requires a command".into()));
                }
                conn.set_property(root, wm_command, &Property::WmCommand(argv))?;
                conn.flush()?;
                conn.send_client_message(root, exit_atom, [0, 0, 0, 0, 0])?;
            }
        }
        conn.flush()
    })();

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dim: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

/// Block until `WM_COMMAND` changes, then return the timestamp of the
/// `PropertyNotify` that reported it.
fn await_property_notify<C: Connection>(conn: &C, atom: Xid) -> dim::Result<u32> {
    loop {
        match conn.wait_for_event()? {
            dim::event::XEvent::PropertyNotify(p) if p.is_root && p.atom == atom => {
                return Ok(conn.last_timestamp());
            }
            _ => continue,
        }
    }
}

/// The binary's built-in default binding set: fullscreen/maximize toggles,
/// move/resize, focus cycling, and the conventional kill/quit/restart
/// bindings every reference window manager ships.
fn default_bindings() -> Bindings<Action> {
    let mut root: HashMap<ChordKey, BindingNode<Action>> = HashMap::new();

    // Mod4+Return: spawn a terminal.
    root.insert(
        ChordKey::Key(KeyCode::new(ModMask::MOD4, 36)),
        BindingNode::Callback(Action::Spawn(vec!["xterm".to_string()])),
    );
    // Mod4+Shift+Q: kill the focused client.
    root.insert(
        ChordKey::Key(KeyCode::new(ModMask::MOD4 | ModMask::SHIFT, 24)),
        BindingNode::Callback(Action::KillClient),
    );
    // Mod4+Control+Q: quit the manager.
    root.insert(
        ChordKey::Key(KeyCode::new(ModMask::MOD4 | ModMask::CONTROL, 24)),
        BindingNode::Callback(Action::Quit),
    );
    // Mod4+Control+R: restart in place.
    root.insert(
        ChordKey::Key(KeyCode::new(ModMask::MOD4 | ModMask::CONTROL, 27)),
        BindingNode::Callback(Action::Restart),
    );
    // Mod4+F: toggle fullscreen.
    root.insert(
        ChordKey::Key(KeyCode::new(ModMask::MOD4, 41)),
        BindingNode::Callback(Action::ToggleFullscreen),
    );
    root.insert(
        ChordKey::Key(KeyCode::new(ModMask::CONTROL | ModMask::MOD1, 21)),
        BindingNode::Callback(Action::ToggleFullscreen),
    );
    // Mod4+M: toggle maximize.
    root.insert(
        ChordKey::Key(KeyCode::new(ModMask::MOD4, 58)),
        BindingNode::Callback(Action::ToggleMaximize),
    );
    // Mod4+Left mouse button on a frame starts an interactive move.
    root.insert(
        ChordKey::Button(ButtonState { button: MouseButton::Left, mask: ModMask::MOD4 }),
        BindingNode::Callback(Action::StartMove),
    );
    // Mod4+Right mouse button starts an interactive resize.
    root.insert(
        ChordKey::Button(ButtonState { button: MouseButton::Right, mask: ModMask::MOD4 }),
        BindingNode::Callback(Action::StartResize),
    );
    // Mod4+Tab starts the focus cycle; release of Mod4
    // commits the target.
    root.insert(
        ChordKey::Key(KeyCode::new(ModMask::MOD4, 23)),
        BindingNode::Callback(Action::StartFocusCycle),
    );
    // Mod4+T: open the minibuffer to edit the focused client's tags.
    root.insert(
        ChordKey::Key(KeyCode::new(ModMask::MOD4, 28)),
        BindingNode::Callback(Action::EditTags),
    );

    Bindings::new(root)
}

fn run_manager(cli: &Cli) -> dim::Result<()> {
    let config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Config::from_toml(&text)?
        }
        None => Config::default(),
    };

    let conn = connect(cli.display.as_deref())?;
    let bindings = default_bindings();
    let mut manager = Manager::new(Box::new(conn), config, bindings);
    manager.startup()?;
    manager.run()
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    if let Some(control) = cli.command {
        return run_control(control, cli.display.as_deref());
    }

    init_tracing();
    match run_manager(&cli) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(dim::Error::WmAlreadyRunning) => {
            eprintln!("dim: another window manager is already running on this display");
            std::process::ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            std::process::ExitCode::FAILURE
        }
    }
}
