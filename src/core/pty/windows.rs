//! ConPTY backend for Windows

use std::io;

use tracing::{debug, info};
use ::windows::core::{PCWSTR, PWSTR};
use ::windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use ::windows::Win32::Storage::FileSystem::{ReadFile, WriteFile};
use ::windows::Win32::System::Console::{
    ClosePseudoConsole, CreatePseudoConsole, ResizePseudoConsole, COORD, HPCON,
};
use ::windows::Win32::System::Pipes::{CreatePipe, PeekNamedPipe};
use ::windows::Win32::System::Threading::{
    CreateProcessW, DeleteProcThreadAttributeList, InitializeProcThreadAttributeList,
    UpdateProcThreadAttribute, WaitForSingleObject, EXTENDED_STARTUPINFO_PRESENT,
    LPPROC_THREAD_ATTRIBUTE_LIST, PROCESS_INFORMATION, STARTUPINFOEXW,
};

use super::{ProcessId, Pty, PtyError, PtySize, Result};

const PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE: usize = 0x00020016;

/// ConPTY handle set. Every handle is an `Option` so it is closed exactly once.
pub struct ConPty {
    /// Control handle used for resizing
    hpc: Option<HPCON>,
    /// We write, the pseudo console reads
    input_write: Option<HANDLE>,
    /// The pseudo console writes, we read
    output_read: Option<HANDLE>,
    input_read: Option<HANDLE>,
    output_write: Option<HANDLE>,
    process: Option<PROCESS_INFORMATION>,
}

// Safety: the handles are owned exclusively by this value
unsafe impl Send for ConPty {}

fn os_error(err: ::windows::core::Error) -> io::Error {
    io::Error::from_raw_os_error(err.code().0)
}

fn coord(cols: u16, rows: u16) -> COORD {
    COORD {
        X: cols.clamp(1, i16::MAX as u16) as i16,
        Y: rows.clamp(1, i16::MAX as u16) as i16,
    }
}

fn close_handle(handle: Option<HANDLE>) {
    if let Some(handle) = handle {
        unsafe {
            let _ = CloseHandle(handle);
        }
    }
}

/// Build a command line, quoting arguments that contain whitespace
fn command_line(program: &str, args: &[String]) -> Result<Vec<u16>> {
    let mut line = String::new();

    for part in std::iter::once(program).chain(args.iter().map(String::as_str)) {
        if part.contains('\0') {
            return Err(PtyError::InvalidArgument(part.to_string()));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        if part.is_empty() || part.contains(char::is_whitespace) {
            line.push('"');
            line.push_str(&part.replace('"', "\\\""));
            line.push('"');
        } else {
            line.push_str(part);
        }
    }

    Ok(line.encode_utf16().chain(std::iter::once(0)).collect())
}

impl ConPty {
    fn output_read(&self) -> Result<HANDLE> {
        self.output_read.ok_or(PtyError::Closed)
    }

    /// Whether the spawned process has terminated
    fn has_exited(&self) -> bool {
        match &self.process {
            Some(process) => unsafe { WaitForSingleObject(process.hProcess, 0) == WAIT_OBJECT_0 },
            None => false,
        }
    }
}

impl Pty for ConPty {
    fn open(size: PtySize) -> Result<Self> {
        let mut input_read = HANDLE::default();
        let mut input_write = HANDLE::default();
        let mut output_read = HANDLE::default();
        let mut output_write = HANDLE::default();

        unsafe {
            CreatePipe(&mut input_read, &mut input_write, None, 0)
                .map_err(|e| PtyError::Open(os_error(e)))?;
        }

        let mut pty = Self {
            hpc: None,
            input_write: Some(input_write),
            output_read: None,
            input_read: Some(input_read),
            output_write: None,
            process: None,
        };

        unsafe {
            CreatePipe(&mut output_read, &mut output_write, None, 0)
                .map_err(|e| PtyError::Open(os_error(e)))?;
        }
        pty.output_read = Some(output_read);
        pty.output_write = Some(output_write);

        let hpc = unsafe {
            CreatePseudoConsole(coord(size.cols, size.rows), input_read, output_write, 0)
                .map_err(|e| PtyError::Open(os_error(e)))?
        };
        pty.hpc = Some(hpc);

        debug!("Created pseudo console {}x{}", size.cols, size.rows);
        Ok(pty)
    }

    fn spawn(&mut self, program: &str, args: &[String]) -> Result<ProcessId> {
        if self.process.is_some() {
            return Err(PtyError::AlreadySpawned);
        }
        let hpc = self.hpc.ok_or(PtyError::Closed)?;
        let mut cmd_wide = command_line(program, args)?;

        let process_info = unsafe {
            let mut attr_list_size: usize = 0;
            let _ = InitializeProcThreadAttributeList(
                LPPROC_THREAD_ATTRIBUTE_LIST::default(),
                1,
                0,
                &mut attr_list_size,
            );

            let mut attr_list_buffer = vec![0u8; attr_list_size];
            let attr_list = LPPROC_THREAD_ATTRIBUTE_LIST(attr_list_buffer.as_mut_ptr() as *mut _);

            InitializeProcThreadAttributeList(attr_list, 1, 0, &mut attr_list_size)
                .map_err(|e| PtyError::Spawn(os_error(e)))?;

            let result = UpdateProcThreadAttribute(
                attr_list,
                0,
                PROC_THREAD_ATTRIBUTE_PSEUDOCONSOLE,
                Some(hpc.0 as *const _),
                std::mem::size_of::<HPCON>(),
                None,
                None,
            )
            .and_then(|()| {
                let mut startup_info = STARTUPINFOEXW {
                    StartupInfo: std::mem::zeroed(),
                    lpAttributeList: attr_list,
                };
                startup_info.StartupInfo.cb = std::mem::size_of::<STARTUPINFOEXW>() as u32;

                let mut process_info = PROCESS_INFORMATION::default();
                CreateProcessW(
                    PCWSTR::null(),
                    PWSTR(cmd_wide.as_mut_ptr()),
                    None,
                    None,
                    false,
                    EXTENDED_STARTUPINFO_PRESENT,
                    None,
                    PCWSTR::null(),
                    &startup_info.StartupInfo,
                    &mut process_info,
                )
                .map(|()| process_info)
            });

            DeleteProcThreadAttributeList(attr_list);
            result.map_err(|e| PtyError::Spawn(os_error(e)))?
        };

        // The pseudo console keeps its own references to the slave ends
        close_handle(self.input_read.take());
        close_handle(self.output_write.take());

        let pid = process_info.dwProcessId;
        self.process = Some(process_info);

        info!("Spawned {} (pid {})", program, pid);
        Ok(pid)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let handle = self.output_read()?;
        let mut available: u32 = 0;

        unsafe {
            if PeekNamedPipe(handle, None, 0, None, Some(&mut available), None).is_err() {
                // Broken pipe: the pseudo console has gone away
                return Err(PtyError::Closed);
            }
        }

        if available == 0 {
            // The pseudo console holds the pipe open after the child exits
            if self.has_exited() {
                info!("Child process exited");
                return Err(PtyError::Closed);
            }
            return Ok(0);
        }

        let to_read = (available as usize).min(buf.len());
        let mut read: u32 = 0;

        unsafe {
            ReadFile(handle, Some(&mut buf[..to_read]), Some(&mut read), None)
                .map_err(|e| PtyError::Read(os_error(e)))?;
        }

        Ok(read as usize)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let handle = self.input_write.ok_or(PtyError::Closed)?;
        let mut written: u32 = 0;

        unsafe {
            WriteFile(handle, Some(data), Some(&mut written), None)
                .map_err(|e| PtyError::Write(os_error(e)))?;
        }

        Ok(written as usize)
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        let hpc = self.hpc.ok_or(PtyError::Closed)?;

        unsafe {
            ResizePseudoConsole(hpc, coord(cols, rows)).map_err(|e| PtyError::Resize(os_error(e)))?;
        }

        Ok(())
    }

    /// Windows consoles deliver Ctrl+C as the raw 0x03 byte
    fn interrupt(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn close(&mut self) {
        if let Some(hpc) = self.hpc.take() {
            unsafe { ClosePseudoConsole(hpc) };
            debug!("Closed pseudo console");
        }

        close_handle(self.input_write.take());
        close_handle(self.output_read.take());
        close_handle(self.input_read.take());
        close_handle(self.output_write.take());

        if let Some(process) = self.process.take() {
            close_handle(Some(process.hProcess));
            close_handle(Some(process.hThread));
        }
    }

    fn child_id(&self) -> Option<ProcessId> {
        self.process.as_ref().map(|p| p.dwProcessId)
    }
}

impl Drop for ConPty {
    fn drop(&mut self) {
        self.close();
    }
}
