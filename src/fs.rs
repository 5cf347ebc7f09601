use rfd::FileDialog;
use std::{
    fs::{read_to_string, write},
    io,
    path::PathBuf,
};

pub const SHADER_EXTENSION: &str = "wgsl";

pub fn create_shader_file(filename: &str) -> Option<PathBuf> {
    FileDialog::new()
        .set_directory("~")
        .add_filter("WGSL Shader", &[SHADER_EXTENSION])
        .set_file_name(filename)
        .save_file()
}

pub fn select_shader_file() -> Option<PathBuf> {
    FileDialog::new()
        .set_directory("~")
        .add_filter("WGSL Shader", &[SHADER_EXTENSION])
        .pick_file()
}

pub fn select_texture() -> Option<PathBuf> {
    FileDialog::new()
        .set_directory("~")
        .add_filter("Textures", &["png", "jpg", "jpeg", "bmp"])
        .pick_file()
}

pub fn read_file(path: &PathBuf) -> io::Result<String> {
    read_to_string(path.as_path())
}

pub fn write_file<C: AsRef<[u8]>>(path: &PathBuf, contents: C) {
    match write(path.as_path(), contents) {
        Ok(_) => {}
        Err(err) => {
            log::warn!("Failed to write file: {}", err);
        }
    }
}
