//! fio syscalls (§4.9 "fio", §8 property 7 and boundary behaviors, scenario
//! 6). PS2 path prefixes (`host:`, `cdrom:`, `mc0:`) are sandboxed to
//! subdirectories of the host process's working directory; every resolved
//! path is checked to still be inside its base before any filesystem
//! operation touches it.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const O_RDONLY: u32 = 0x0000;
pub const O_WRONLY: u32 = 0x0001;
pub const O_RDWR: u32 = 0x0002;
pub const O_APPEND: u32 = 0x0100;
pub const O_CREAT: u32 = 0x0200;
pub const O_TRUNC: u32 = 0x0400;

pub const SEEK_SET: u32 = 0;
pub const SEEK_CUR: u32 = 1;
pub const SEEK_END: u32 = 2;

const STAT_MODE_DIR: u32 = 0x4000;
const STAT_MODE_FILE: u32 = 0x2000;

fn base_dir_for(name: &str, cwd: &Path) -> PathBuf {
    match name {
        "host" | "host0" => cwd.join("host_fs"),
        "cdrom" | "cdrom0" => cwd.join("cd_fs"),
        "mc0" => cwd.join("mc0_fs"),
        _ => cwd.join("host_fs"),
    }
}

/// Resolves a PS2 path (`"host:sub/dir/file.bin"`, or a bare
/// `"sub/file.bin"` resolved against the emulated cwd) to a host path,
/// rejecting anything that would escape its sandbox base (§4.9, §8
/// property 7). Returns `None` on escape.
fn resolve(path: &str, process_cwd: &Path, emulated_cwd: &str) -> Option<PathBuf> {
    let (base, rel) = if let Some(idx) = path.find(':') {
        let (prefix, rest) = path.split_at(idx);
        (base_dir_for(prefix, process_cwd), rest.trim_start_matches(':'))
    } else {
        (base_dir_for("host", process_cwd).join(emulated_cwd.trim_start_matches('/')), path)
    };
    let mut resolved = base.clone();
    for comp in rel.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                if !resolved.pop() {
                    return None;
                }
            }
            other => resolved.push(other),
        }
    }
    // The sandbox check: the resolved path's ancestors must still include
    // `base`. Compare lexically rather than canonicalising, since the
    // target file may not exist yet (e.g. O_CREAT).
    let base_normalised = normalise(&base);
    let resolved_normalised = normalise(&resolved);
    if resolved_normalised.starts_with(&base_normalised) {
        Some(resolved)
    } else {
        None
    }
}

fn normalise(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in p.components() {
        match comp {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn mode_to_rust_open(flags: u32) -> OpenOptions {
    let mut opts = OpenOptions::new();
    let access = flags & (O_RDONLY | O_WRONLY | O_RDWR);
    match (access, flags & O_APPEND != 0, flags & O_TRUNC != 0) {
        (O_WRONLY, true, _) => {
            opts.write(true).append(true).create(true);
        }
        (O_RDWR, true, _) => {
            opts.read(true).append(true).create(true);
        }
        (O_RDWR, false, true) => {
            opts.read(true).write(true).truncate(true).create(true);
        }
        (O_RDWR, false, false) => {
            opts.read(true).write(true);
        }
        (O_WRONLY, false, true) => {
            opts.write(true).truncate(true).create(true);
        }
        (O_WRONLY, false, false) => {
            opts.write(true).create(flags & O_CREAT != 0);
        }
        _ => {
            opts.read(true);
        }
    }
    opts
}

struct OpenFile {
    file: File,
}

#[derive(Default)]
pub struct FioTable {
    process_cwd: PathBuf,
    emulated_cwd: Mutex<String>,
    open_files: Mutex<HashMap<i32, OpenFile>>,
    next_fd: Mutex<i32>,
}

impl FioTable {
    pub fn new(process_cwd: PathBuf) -> Self {
        Self {
            process_cwd,
            emulated_cwd: Mutex::new(String::new()),
            open_files: Mutex::new(HashMap::new()),
            next_fd: Mutex::new(3),
        }
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let cwd = self.emulated_cwd.lock().unwrap().clone();
        resolve(path, &self.process_cwd, &cwd)
    }

    pub fn open(&self, path: &str, flags: u32) -> i32 {
        let Some(host_path) = self.resolve(path) else {
            return -1;
        };
        if flags & O_CREAT != 0 {
            if let Some(parent) = host_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        match mode_to_rust_open(flags).open(&host_path) {
            Ok(file) => {
                let mut next = self.next_fd.lock().unwrap();
                let fd = *next;
                *next += 1;
                self.open_files.lock().unwrap().insert(fd, OpenFile { file });
                fd
            }
            Err(_) => -1,
        }
    }

    pub fn close(&self, fd: i32) -> i32 {
        if self.open_files.lock().unwrap().remove(&fd).is_some() {
            0
        } else {
            -1
        }
    }

    pub fn read(&self, fd: i32, buf: &mut [u8]) -> i32 {
        let mut files = self.open_files.lock().unwrap();
        let Some(f) = files.get_mut(&fd) else { return -1 };
        match f.file.read(buf) {
            Ok(n) => n as i32,
            Err(_) => -1,
        }
    }

    pub fn write(&self, fd: i32, buf: &[u8]) -> i32 {
        let mut files = self.open_files.lock().unwrap();
        let Some(f) = files.get_mut(&fd) else { return -1 };
        match f.file.write(buf) {
            Ok(n) => n as i32,
            Err(_) => -1,
        }
    }

    /// Supports `SEEK_SET/CUR/END`; rejects a resulting offset that is
    /// negative or exceeds `i32::MAX`, without moving the file pointer in
    /// that case (§8 boundary behaviors).
    pub fn lseek(&self, fd: i32, offset: i32, whence: u32) -> i32 {
        let mut files = self.open_files.lock().unwrap();
        let Some(f) = files.get_mut(&fd) else { return -1 };
        let current = match f.file.stream_position() {
            Ok(p) => p as i64,
            Err(_) => return -1,
        };
        let len = match f.file.metadata() {
            Ok(m) => m.len() as i64,
            Err(_) => return -1,
        };
        let target = match whence {
            SEEK_SET => offset as i64,
            SEEK_CUR => current + offset as i64,
            SEEK_END => len + offset as i64,
            _ => return -1,
        };
        if target < 0 || target > i32::MAX as i64 {
            return -1;
        }
        match f.file.seek(SeekFrom::Start(target as u64)) {
            Ok(p) => p as i32,
            Err(_) => -1,
        }
    }

    pub fn mkdir(&self, path: &str) -> i32 {
        let Some(host_path) = self.resolve(path) else { return -1 };
        match std::fs::create_dir_all(&host_path) {
            Ok(()) => 0,
            Err(_) => -1,
        }
    }

    pub fn rmdir(&self, path: &str) -> i32 {
        let Some(host_path) = self.resolve(path) else { return -1 };
        match std::fs::remove_dir(&host_path) {
            Ok(()) => 0,
            Err(_) => -1,
        }
    }

    pub fn remove(&self, path: &str) -> i32 {
        let Some(host_path) = self.resolve(path) else { return -1 };
        match std::fs::remove_file(&host_path) {
            Ok(()) => 0,
            Err(_) => -1,
        }
    }

    /// Updates the *emulated* cwd only; never touches the host process's
    /// own working directory (§4.9). If the directory named no longer
    /// exists, bare-path resolution silently falls back to the sandbox
    /// root the next time a relative path is opened.
    pub fn chdir(&self, path: &str) -> i32 {
        let Some(host_path) = self.resolve(path) else { return -1 };
        if !host_path.is_dir() {
            return -1;
        }
        let rel = path.splitn(2, ':').last().unwrap_or(path);
        *self.emulated_cwd.lock().unwrap() = rel.to_string();
        0
    }

    /// Writes the 64-byte `getstat` struct: word 0 is mode
    /// (`STAT_MODE_DIR`/`STAT_MODE_FILE`), words 2/9 hold the low/high
    ///32 bits of size (§4.9).
    pub fn getstat(&self, path: &str) -> Option<[u8; 64]> {
        let host_path = self.resolve(path)?;
        let meta = std::fs::metadata(&host_path).ok()?;
        let mut out = [0u8; 64];
        let mode = if meta.is_dir() { STAT_MODE_DIR } else { STAT_MODE_FILE };
        out[0..4].copy_from_slice(&mode.to_le_bytes());
        let size = meta.len();
        out[8..12].copy_from_slice(&(size as u32).to_le_bytes());
        out[36..40].copy_from_slice(&((size >> 32) as u32).to_le_bytes());
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table() -> (TempDir, FioTable) {
        let dir = TempDir::new().unwrap();
        let table = FioTable::new(dir.path().to_path_buf());
        (dir, table)
    }

    #[test]
    fn escape_attempt_is_rejected_and_creates_nothing() {
        let (_dir, table) = table();
        let fd = table.open("host:../escape.bin", O_CREAT | O_WRONLY);
        assert_eq!(fd, -1);
    }

    #[test]
    fn mkdir_chdir_open_write_close_getstat_round_trip() {
        let (_dir, table) = table();
        assert_eq!(table.mkdir("host:d"), 0);
        assert_eq!(table.chdir("host:d"), 0);
        let fd = table.open("f.bin", O_WRONLY | O_CREAT);
        assert!(fd >= 0);
        assert_eq!(table.write(fd, b"hello"), 5);
        assert_eq!(table.close(fd), 0);

        let st = table.getstat("host:d/f.bin").unwrap();
        let mode = u32::from_le_bytes(st[0..4].try_into().unwrap());
        let size_lo = u32::from_le_bytes(st[8..12].try_into().unwrap());
        assert_eq!(mode, STAT_MODE_FILE);
        assert_eq!(size_lo, 5);
    }

    #[test]
    fn lseek_cur_past_int32_max_is_rejected_without_moving() {
        let (_dir, table) = table();
        let fd = table.open("host:f.bin", O_WRONLY | O_CREAT);
        assert_eq!(table.lseek(fd, i32::MAX, SEEK_SET), i32::MAX);
        assert_eq!(table.lseek(fd, 1, SEEK_CUR), -1);
        assert_eq!(table.lseek(fd, 0, SEEK_CUR), i32::MAX);
    }

    #[test]
    fn wronly_trunc_without_creat_replaces_existing_content_when_creat_absent() {
        let (_dir, table) = table();
        let fd = table.open("host:a.bin", O_WRONLY | O_CREAT);
        table.write(fd, b"0123456789");
        table.close(fd);
        // O_CREAT without O_TRUNC keeps existing content.
        let fd2 = table.open("host:a.bin", O_RDWR);
        let mut buf = [0u8; 10];
        assert_eq!(table.read(fd2, &mut buf), 10);
        assert_eq!(&buf, b"0123456789");
    }
}
