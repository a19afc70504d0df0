//! The `fuser::Filesystem` implementation (spec.md §1 "kernel upcall
//! glue", out of scope for `core` itself). Every method here does
//! exactly two things: translate between FUSE's inode/fh vocabulary
//! and `core`'s path/handle vocabulary, and translate `core`'s
//! `CoreResult` back into a FUSE reply.
//!
//! Grounded on the dispatcher shape of `RemoteFS`/`FsWrapper` in the
//! teacher's `client/src/fs/mod.rs`: one struct holding all state
//! behind a single lock, one method per kernel callback, each a thin
//! wrapper around a sibling module's function. Here the sibling module
//! is `remotefs_core::fsops`.

use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyIoctl, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use libc::{EINVAL, ENOENT};

use remotefs_core::fsops;
use remotefs_core::Context;

use crate::inode::{InodeTable, ROOT_INODE};

const TTL: Duration = Duration::from_secs(1);

/// Shared, lockable adapter state. `fuser::mount2` clones the
/// `Filesystem` value across kernel threads via `&mut self`, so the
/// actual state lives behind a mutex the way the teacher's `FsWrapper`
/// wraps `RemoteFS` — `core` itself does its own fine-grained locking
/// underneath, this lock only protects the inode table.
pub struct RemoteFsAdapter {
    ctx: Arc<Context>,
    inodes: Mutex<InodeTable>,
}

impl RemoteFsAdapter {
    pub fn new(ctx: Arc<Context>) -> Self {
        RemoteFsAdapter {
            ctx,
            inodes: Mutex::new(InodeTable::new()),
        }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.inodes.lock().unwrap().path(ino).map(str::to_string)
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent_path = self.path_of(parent)?;
        let name = name.to_str()?;
        Some(remotefs_core::time::join_path(&parent_path, name))
    }

    fn to_file_attr(&self, ino: u64, stat: &remotefs_core::metadata_cache::Stat) -> FileAttr {
        let mtime = UNIX_EPOCH + Duration::from_secs(stat.mtime.max(0) as u64);
        FileAttr {
            ino,
            size: stat.size,
            blocks: stat.size.div_ceil(512),
            atime: mtime,
            mtime,
            ctime: mtime,
            crtime: UNIX_EPOCH,
            kind: if stat.is_dir { FileType::Directory } else { FileType::RegularFile },
            perm: (stat.mode & 0o7777) as u16,
            nlink: if stat.is_dir { 2 } else { 1 },
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            rdev: 0,
            blksize: fsops::FILE_BLOCK_SIZE as u32,
            flags: 0,
        }
    }

    fn getattr_reply(&self, ino: u64, path: &str) -> Option<FileAttr> {
        fsops::getattr(&self.ctx, path).ok().map(|stat| self.to_file_attr(ino, &stat))
    }
}

impl Filesystem for RemoteFsAdapter {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(ENOENT);
            return;
        };
        match self.getattr_reply(0, &path) {
            Some(mut attr) => {
                let ino = self.inodes.lock().unwrap().ensure(&path);
                attr.ino = ino;
                reply.entry(&TTL, &attr, 0);
            }
            None => reply.error(ENOENT),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(ENOENT);
            return;
        };
        match self.getattr_reply(ino, &path) {
            Some(attr) => reply.attr(&TTL, &attr),
            None => reply.error(ENOENT),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(ENOENT);
            return;
        };
        if let Some(mode) = mode {
            if let Err(e) = fsops::chmod(&self.ctx, &path, mode as i32) {
                reply.error(-e.to_errno());
                return;
            }
        }
        if let Some(size) = size {
            if let Err(e) = fsops::truncate(&self.ctx, &path, size) {
                reply.error(-e.to_errno());
                return;
            }
        }
        match self.getattr_reply(ino, &path) {
            Some(attr) => reply.attr(&TTL, &attr),
            None => reply.error(ENOENT),
        }
    }

    fn mkdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, mode: u32, _umask: u32, reply: ReplyEntry) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(ENOENT);
            return;
        };
        if let Err(e) = fsops::mkdir(&self.ctx, &path) {
            let _ = mode;
            reply.error(-e.to_errno());
            return;
        }
        match self.getattr_reply(0, &path) {
            Some(mut attr) => {
                let ino = self.inodes.lock().unwrap().ensure(&path);
                attr.ino = ino;
                reply.entry(&TTL, &attr, 0);
            }
            None => reply.error(ENOENT),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(ENOENT);
            return;
        };
        match fsops::unlink(&self.ctx, &path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(-e.to_errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(ENOENT);
            return;
        };
        match fsops::rmdir(&self.ctx, &path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(-e.to_errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(from), Some(to)) = (self.child_path(parent, name), self.child_path(newparent, newname)) else {
            reply.error(ENOENT);
            return;
        };
        match fsops::rename(&self.ctx, &from, &to) {
            Ok(()) => {
                let mut inodes = self.inodes.lock().unwrap();
                let ino = inodes.ensure(&from);
                let _ = inodes.ensure(&to);
                let _ = ino;
                reply.ok();
            }
            Err(e) => reply.error(-e.to_errno()),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(path) = self.child_path(parent, name) else {
            reply.error(ENOENT);
            return;
        };
        if let Err(e) = fsops::create(&self.ctx, &path, mode as i32) {
            reply.error(-e.to_errno());
            return;
        }
        match fsops::open(&self.ctx, &path, flags) {
            Ok(handle) => {
                let ino = self.inodes.lock().unwrap().ensure(&path);
                let attr = self.getattr_reply(ino, &path).unwrap_or(FileAttr {
                    ino,
                    size: 0,
                    blocks: 0,
                    atime: UNIX_EPOCH,
                    mtime: UNIX_EPOCH,
                    ctime: UNIX_EPOCH,
                    crtime: UNIX_EPOCH,
                    kind: FileType::RegularFile,
                    perm: fsops::DEF_FILE_MODE as u16,
                    nlink: 1,
                    uid: unsafe { libc::getuid() },
                    gid: unsafe { libc::getgid() },
                    rdev: 0,
                    blksize: fsops::FILE_BLOCK_SIZE as u32,
                    flags: 0,
                });
                reply.created(&TTL, &attr, 0, handle.id, 0);
            }
            Err(e) => reply.error(-e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_of(ino) else {
            reply.error(ENOENT);
            return;
        };
        match fsops::open(&self.ctx, &path, flags) {
            Ok(handle) => reply.opened(handle.id, 0),
            Err(e) => reply.error(-e.to_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(handle) = self.ctx.handles.get_file(fh) else {
            reply.error(libc::EBADF);
            return;
        };
        match fsops::read(&self.ctx, &handle, offset, size as usize) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(-e.to_errno()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(handle) = self.ctx.handles.get_file(fh) else {
            reply.error(libc::EBADF);
            return;
        };
        match fsops::write(&self.ctx, &handle, offset, data) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(-e.to_errno()),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        let Some(handle) = self.ctx.handles.get_file(fh) else {
            reply.error(libc::EBADF);
            return;
        };
        match fsops::flush(&self.ctx, &handle) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(-e.to_errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.ctx.handles.get_file(fh) {
            Some(handle) => {
                fsops::close(&self.ctx, &handle);
                reply.ok();
            }
            None => reply.error(libc::EBADF),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_of(ino) else {
            reply.error(ENOENT);
            return;
        };
        match fsops::opendir(&self.ctx, &path) {
            Ok(handle) => reply.opened(handle.id, 0),
            Err(e) => reply.error(-e.to_errno()),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let Some(handle) = self.ctx.handles.get_dir(fh) else {
            reply.error(libc::EBADF);
            return;
        };

        let mut entries: Vec<(FileType, String)> = Vec::new();
        if offset == 0 {
            entries.push((FileType::Directory, ".".to_string()));
            entries.push((FileType::Directory, "..".to_string()));
        }

        let result = fsops::readdir(&self.ctx, &handle, |name, stat| {
            let kind = stat.map(|s| s.is_dir).unwrap_or(false);
            entries.push((
                if kind { FileType::Directory } else { FileType::RegularFile },
                name.to_string(),
            ));
        });
        if let Err(e) = result {
            reply.error(-e.to_errno());
            return;
        }

        let dir_path = self.path_of(ino).unwrap_or_else(|| "/".to_string());
        let mut inodes = self.inodes.lock().unwrap();
        for (i, (kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            let child_ino = match name.as_str() {
                "." => ino,
                ".." => inodes.parent_of(&dir_path),
                _ => inodes.ensure(&remotefs_core::time::join_path(&dir_path, &name)),
            };
            if reply.add(child_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        match self.ctx.handles.get_dir(fh) {
            Some(handle) => {
                fsops::closedir(&self.ctx, &handle);
                reply.ok();
            }
            None => reply.error(libc::EBADF),
        }
    }

    fn ioctl(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: u32,
        cmd: u32,
        _in_data: &[u8],
        out_size: u32,
        reply: ReplyIoctl,
    ) {
        match fsops::ioctl_raw(&self.ctx, cmd as i64) {
            Ok(fsops::IoctlResult::Cleared) => reply.ioctl(0, &[]),
            Ok(fsops::IoctlResult::Connections(report)) => {
                let mut buf = Vec::with_capacity(16);
                buf.extend_from_slice(&report.in_use_shortop.to_le_bytes());
                buf.extend_from_slice(&report.in_use_general.to_le_bytes());
                buf.extend_from_slice(&report.in_use_onetime.to_le_bytes());
                buf.extend_from_slice(&report.free.to_le_bytes());
                buf.truncate(out_size as usize);
                reply.ioctl(0, &buf);
            }
            Err(_) => reply.error(EINVAL),
        }
    }
}

/// Special-cased path lookup for the mount root, used by `main` before
/// any kernel `lookup` call has happened.
pub fn root_inode() -> u64 {
    ROOT_INODE
}
