use std::io::stdout;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use ratatui::DefaultTerminal;

use crate::app::effects::Runtime;
use crate::app::{App, Message, Model, update};
use crate::debounce::Debouncer;

const RESIZE_DEBOUNCE_MS: u64 = 100;

impl App {
    /// Run the main event loop.
    ///
    /// # Errors
    ///
    /// Returns an error if terminal initialization or the event loop
    /// encounters an I/O failure.
    pub fn run(&mut self) -> Result<()> {
        let _run_scope = crate::perf::scope("app.run.total");

        let init_scope = crate::perf::scope("app.ratatui_init");
        let mut terminal = ratatui::try_init()
            .context("Failed to initialize terminal - novel-reader requires an interactive terminal")?;
        let size = terminal.size()?;
        drop(init_scope);

        let settings = crate::settings::load_or_default(&self.settings_path);
        let mut model = Model::new(settings, self.settings_path.clone(), (size.width, size.height))
            .with_window(self.max_chapters);
        model.watch_enabled = self.watch_enabled;
        model.toc_visible = self.toc_visible;
        model.wrap_width = self.wrap_width;
        model.config_global_path.clone_from(&self.config_global_path);
        model.config_local_path.clone_from(&self.config_local_path);
        model.relayout();
        crate::perf::log_event(
            "init.layout",
            format!(
                "terminal={}x{} toc_visible={} text_w={} wrap_width={:?}",
                size.width,
                size.height,
                model.toc_visible,
                model.text_width(),
                model.wrap_width
            ),
        );

        let mut runtime = Runtime::new();
        runtime.watch_settings(&mut model);
        runtime.open_from_settings(&mut model);

        let _ = execute!(stdout(), EnableMouseCapture);
        let result = Self::event_loop(&mut terminal, &mut model, &mut runtime);
        runtime.flush_position(&mut model);

        let _ = execute!(stdout(), DisableMouseCapture);
        ratatui::restore();

        result
    }

    fn dispatch(model: &mut Model, runtime: &mut Runtime, msg: Message, frame_idx: u64) {
        crate::perf::log_event("event.message", format!("frame={frame_idx} msg={msg:?}"));
        let side_msg = msg.clone();
        *model = update(std::mem::take(model), msg);
        runtime.handle_message_side_effects(model, &side_msg);
    }

    fn event_loop(terminal: &mut DefaultTerminal, model: &mut Model, runtime: &mut Runtime) -> Result<()> {
        let start = Instant::now();
        let elapsed_ms = || u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let mut resize_debouncer = Debouncer::new(RESIZE_DEBOUNCE_MS);
        let mut frame_idx: u64 = 0;
        let mut needs_render = true;

        loop {
            model.now_ms = elapsed_ms();

            if model.expire_toast(Instant::now()) {
                needs_render = true;
            }

            if let Some((width, height)) = resize_debouncer.take_ready(model.now_ms) {
                crate::perf::log_event(
                    "event.resize.apply",
                    format!("frame={frame_idx} width={width} height={height}"),
                );
                Self::dispatch(model, runtime, Message::Resize(width, height), frame_idx);
                needs_render = true;
            }

            let mut background = runtime.drain_workers();
            background.extend(runtime.poll_watchers(model, model.now_ms));
            for msg in background {
                Self::dispatch(model, runtime, msg, frame_idx);
                needs_render = true;
            }

            // Handle events
            let busy = resize_debouncer.is_pending()
                || model.split_running
                || model.reader.is_loading()
                || model.reader.save_pending()
                || model.reader.anchor().pending().is_some();
            let poll_ms = if needs_render {
                0
            } else if busy {
                10
            } else {
                250
            };
            if event::poll(Duration::from_millis(poll_ms))? {
                // Refresh timestamp after poll wait so debouncers use accurate times.
                model.now_ms = elapsed_ms();
                if let Some(msg) = Self::handle_event(&event::read()?, model, model.now_ms, &mut resize_debouncer) {
                    Self::dispatch(model, runtime, msg, frame_idx);
                    needs_render = true;
                }

                // Coalesce key repeat bursts into a single render.
                let mut drained = 0_u32;
                while event::poll(Duration::from_millis(0))? {
                    model.now_ms = elapsed_ms();
                    if let Some(msg) = Self::handle_event(&event::read()?, model, model.now_ms, &mut resize_debouncer) {
                        drained += 1;
                        Self::dispatch(model, runtime, msg, frame_idx);
                        needs_render = true;
                    }
                }
                if drained > 0 {
                    crate::perf::log_event("event.drain", format!("frame={frame_idx} drained={drained}"));
                }
            }

            if needs_render || model.reader.anchor().pending().is_some() {
                frame_idx += 1;

                let prep_start = Instant::now();
                if model.reader.layout_pass(model.now_ms).is_some() {
                    crate::perf::log_event("frame.scroll_applied", format!("frame={frame_idx}"));
                }
                model.sync_toc_with_reader();
                crate::perf::log_event(
                    "frame.prep",
                    format!(
                        "frame={} prep_ms={:.3} viewport={:?} lines={}",
                        frame_idx,
                        prep_start.elapsed().as_secs_f64() * 1000.0,
                        model.reader.viewport().visible_range(),
                        model.reader.layout().line_count()
                    ),
                );

                let draw_start = Instant::now();
                terminal.draw(|frame| Self::view(model, frame))?;
                crate::perf::log_event(
                    "frame.draw",
                    format!(
                        "frame={} draw_ms={:.3}",
                        frame_idx,
                        draw_start.elapsed().as_secs_f64() * 1000.0
                    ),
                );
                needs_render = false;
            }

            runtime.persist_position(model);

            if model.should_quit {
                break;
            }
        }
        Ok(())
    }
}
