mod app;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{fs::File, io, time::Duration};

use rusttuiamp::audio::AudioEngine;
use rusttuiamp::config::Args;
use rusttuiamp::{ImpulseResponse, NamFile, StageId};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let mut app = setup(&args)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let result = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    app.stop();
    if let Err(e) = result {
        log::error!("{:?}", e);
        eprintln!("Error: {:?}", e);
    }
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    let file = File::create(&args.log_file)
        .with_context(|| format!("Cannot open log file {}", args.log_file.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn setup(args: &Args) -> Result<App> {
    let mut engine = AudioEngine::new(args.block_size as usize)?;

    let ir = match &args.ir {
        Some(path) => Some(
            ImpulseResponse::load(path, engine.sample_rate())
                .with_context(|| format!("Failed to load IR {}", path.display()))?,
        ),
        None => None,
    };
    engine.configure(|chain| {
        chain.set_parameter(StageId::Ir.key(), "volume", args.volume);
        if let Some(ir) = ir {
            chain.attach_processor(StageId::Ir, Box::new(ir));
        }
    })?;

    let model_info = match &args.model {
        Some(path) => {
            let model = NamFile::load(path)
                .with_context(|| format!("Failed to load model {}", path.display()))?;
            let info = model.info();
            log::info!(
                "Model {}: {:?} v{:?}, {} layers, {} weights (no inference backend attached)",
                path.display(), info.architecture, info.version, info.num_layers, info.num_weights
            );
            Some(info)
        }
        None => None,
    };

    let mut app = App::new(engine, args.play.clone(), model_info);
    if args.play.is_some() {
        app.play();
    }
    Ok(app)
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Release {
                    continue;
                }

                match key.code {
                    KeyCode::Esc => break,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,

                    KeyCode::Up    => app.stage_up(),
                    KeyCode::Down  => app.stage_down(),
                    KeyCode::Left  => app.param_left(),
                    KeyCode::Right => app.param_right(),
                    KeyCode::Char('+') | KeyCode::Char('=') => app.param_up(),
                    KeyCode::Char('-') | KeyCode::Char('_') => app.param_down(),

                    KeyCode::Char(' ') | KeyCode::Enter => app.toggle_stage(),
                    KeyCode::Char('t') => app.tap_tempo(),
                    KeyCode::Char('r') => app.reset_stage(),

                    KeyCode::Char('p') => app.play(),
                    KeyCode::Char('m') => app.monitor(),
                    KeyCode::Char('s') => app.stop(),
                    KeyCode::Char('q') => app.should_quit = true,

                    _ => {}
                }
            }
        }
        if app.should_quit { break; }
    }

    Ok(())
}
