// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tokio::process::{Child, Command};
use tracing::info;

/// 子进程退出结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// 退出码，被信号终止时为 `None`
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// 被看门狗管理的进程
#[async_trait]
pub trait SupervisedProcess: Send {
    /// 进程 id
    fn id(&self) -> Option<u32>;

    /// 最多等待 `timeout`，超时返回 `None`
    async fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ProcessExit>>;

    /// 等待进程退出
    async fn wait(&mut self) -> io::Result<ProcessExit>;

    /// 请求进程优雅退出（SIGTERM）
    fn terminate(&mut self) -> io::Result<()>;

    /// 强制结束进程（SIGKILL）
    fn kill(&mut self) -> io::Result<()>;
}

/// 进程启动器
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self) -> io::Result<Box<dyn SupervisedProcess>>;
}

/// 基于 tokio 的子进程
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

#[async_trait]
impl SupervisedProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ProcessExit>> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => Ok(Some(status?.into())),
            Err(_) => Ok(None),
        }
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        Ok(self.child.wait().await?.into())
    }

    fn terminate(&mut self) -> io::Result<()> {
        let pid = self
            .child
            .id()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "process already exited"))?;
        let pid = Pid::from_u32(pid);

        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        match system.process(pid).map(|p| p.kill_with(Signal::Term)) {
            Some(Some(true)) => Ok(()),
            Some(Some(false)) => Err(io::Error::other("failed to send SIGTERM")),
            Some(None) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "SIGTERM is not supported on this platform",
            )),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "process not found")),
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }
}

/// 按命令行启动同步进程
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// 解析以空白分隔的命令行
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    /// 与当前可执行文件同目录的程序
    pub fn sibling(name: &str) -> io::Result<Self> {
        let current = std::env::current_exe()?;
        let dir = current
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "executable has no parent directory"))?;
        Ok(Self::new(dir.join(name), Vec::new()))
    }
}

impl ProcessLauncher for CommandLauncher {
    fn launch(&self) -> io::Result<Box<dyn SupervisedProcess>> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        info!(
            "Launched {} (pid={:?})",
            self.program.display(),
            child.id()
        );
        Ok(Box::new(ChildProcess::new(child)))
    }
}
