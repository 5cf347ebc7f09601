#![windows_subsystem = "windows"]

mod app;
mod core;
mod error;
mod event;
mod fps_counter;
mod fs;
mod meta;
mod renderer;
mod session;
mod ui;
mod uniform;

fn main() {
    env_logger::init();

    match app::App::new() {
        Ok(app) => app.run(),
        Err(err) => {
            log::error!("Failed to start: {:#}", err);
            std::process::exit(1);
        }
    }
}
