//! Proactor End-to-End Smoke Test
//!
//! Drives every operation kind through a live reactor thread:
//!   Part A, Ring basics: nop, delay, native failure
//!   Part B, Files: open, write, stat, read, vectored I/O, close
//!   Part C, Timeouts: linked guard firing and disarming, splice
//!   Part D, Network: listen, socket, connect, accept over loopback
//!   Part E, Shutdown: termination promise, Closed afterwards
//!
//! Run: ./target/release/proactor-smoke
//! Set RUST_LOG=proactor=debug to watch the reactor.

use proactor::{ListenParams, OpenParams, ProactorConfig, ProactorHandle, Reactor, SocketParams, StatParams};
use proactor_core::flags::{OpenFlags, SocketFlag};
use proactor_core::{
    AddressFamily, Failure, FileDescriptor, IoResult, OffsetT, Promise, SizeT, SpliceDescriptor,
    Timeout,
};
use proactor_module::offheap::{OffHeapBuffer, OffHeapIoVector};

use std::fmt::Debug;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const WAIT: Duration = Duration::from_secs(5);

// ── Test harness ──

enum Verdict {
    Pass,
    Fail(String),
}

/// Records every step, echoes it to stdout and to the tracing subscriber,
/// and lists the failures again at the end.
struct SmokeRun {
    steps: Vec<(String, Verdict)>,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl SmokeRun {
    fn new() -> Self {
        Self { steps: Vec::new() }
    }

    fn section(&self, name: &str) {
        info!(section = name, "smoke section");
        println!("\n{}", LINE);
        println!("  {}", name);
        println!("{}", LINE);
    }

    fn record(&mut self, name: &str, verdict: Verdict) {
        let n = self.steps.len() + 1;
        match &verdict {
            Verdict::Pass => println!("  [{:2}] {:<52} PASS", n, name),
            Verdict::Fail(reason) => {
                warn!(step = name, %reason, "smoke step failed");
                println!("  [{:2}] {:<52} FAIL: {}", n, name, reason);
            }
        }
        self.steps.push((name.to_string(), verdict));
    }

    fn check(&mut self, name: &str, ok: bool, reason: &str) {
        let verdict = if ok { Verdict::Pass } else { Verdict::Fail(reason.to_string()) };
        self.record(name, verdict);
    }

    /// Wait for `promise`. A timeout is recorded as a failure of `name`.
    fn settle<T: Clone + Send + Sync + 'static>(&mut self, name: &str, promise: Promise<T>) -> Option<IoResult<T>> {
        let result = promise.join_timeout(WAIT);
        if result.is_none() {
            self.record(name, Verdict::Fail(format!("no result after {:?}", WAIT)));
        }
        result
    }

    /// Pass if `promise` succeeds; hands the value on.
    fn expect_ok<T: Clone + Send + Sync + 'static>(&mut self, name: &str, promise: Promise<T>) -> Option<T> {
        match self.settle(name, promise)? {
            Ok(value) => {
                self.record(name, Verdict::Pass);
                Some(value)
            }
            Err(e) => {
                self.record(name, Verdict::Fail(e.to_string()));
                None
            }
        }
    }

    /// Pass if `promise` fails with a cause accepted by `expected`.
    fn expect_err<T>(&mut self, name: &str, promise: Promise<T>, expected: impl Fn(&Failure) -> bool) -> bool
    where
        T: Clone + Debug + Send + Sync + 'static,
    {
        match self.settle(name, promise) {
            Some(Err(e)) if expected(&e) => {
                self.record(name, Verdict::Pass);
                true
            }
            Some(other) => {
                self.record(name, Verdict::Fail(format!("{:?}", other)));
                false
            }
            None => false,
        }
    }

    fn failed(&self) -> usize {
        self.steps.iter().filter(|(_, v)| matches!(v, Verdict::Fail(_))).count()
    }

    fn summary(&self) {
        let failed = self.failed();
        info!(steps = self.steps.len(), failed, "smoke run finished");
        println!("\n{}", LINE);
        println!(
            "  Total: {}  Passed: {}  Failed: {}",
            self.steps.len(),
            self.steps.len() - failed,
            failed
        );
        for (name, verdict) in &self.steps {
            if let Verdict::Fail(reason) = verdict {
                println!("    FAILED {}: {}", name, reason);
            }
        }
        println!("{}", LINE);
    }
}

/// Scratch memory shared by the sections. Outlives the reactor.
struct Scratch {
    small: OffHeapBuffer,
    large: OffHeapBuffer,
}

fn pipe() -> Option<(FileDescriptor, FileDescriptor)> {
    let mut fds = [0; 2];
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    (rc == 0).then(|| (FileDescriptor::new(fds[0]), FileDescriptor::new(fds[1])))
}

// ════════════════════════════════════════════════════════════
// Part A, Ring basics
// ════════════════════════════════════════════════════════════

fn test_basics(t: &mut SmokeRun, h: &ProactorHandle, s: &Scratch) {
    t.section("Part A, Ring basics");

    t.expect_ok("nop", h.nop());

    if let Some(elapsed) = t.expect_ok("delay 50ms", h.delay(Timeout::from_millis(50))) {
        t.check("delay elapsed >= 50ms", elapsed >= Duration::from_millis(50), &format!("{:?}", elapsed));
    }

    let bad = unsafe { h.read(FileDescriptor::INVALID, s.small.span(), OffsetT::CURRENT, None) };
    t.expect_err("read(-1) → EBADF", bad, |e| e.errno() == Some(libc::EBADF));

    let batch: Vec<Promise<()>> = (0..32).map(|_| h.nop()).collect();
    let start = Instant::now();
    let ok = batch.into_iter().all(|p| p.join_timeout(WAIT) == Some(Ok(())));
    t.check("32 nops batched", ok, &format!("after {:?}", start.elapsed()));
}

// ════════════════════════════════════════════════════════════
// Part B, Files
// ════════════════════════════════════════════════════════════

fn test_files(t: &mut SmokeRun, h: &ProactorHandle, s: &mut Scratch) {
    t.section("Part B, Files");

    let path = std::env::temp_dir().join(format!("proactor-smoke-{}", std::process::id()));
    let flags = OpenFlags::CREATE | OpenFlags::READ_WRITE | OpenFlags::TRUNCATE;
    let Some(fd) = t.expect_ok("open(O_CREAT)", h.open(OpenParams::new(&path).flags(flags), None)) else {
        return;
    };

    let payload = b"proactor smoke payload";
    s.small.fill(payload);
    let wrote = unsafe { h.write(fd, s.small.used_span(), OffsetT::START, None) };
    if let Some(n) = t.expect_ok("write", wrote) {
        t.check("write length", n == SizeT(payload.len() as u64), &n.to_string());
    }

    if let Some(stat) = t.expect_ok("stat(path)", h.stat(StatParams::path(&path), None)) {
        t.check("stat size", stat.size == payload.len() as u64, &stat.size.to_string());
        t.check("stat regular file", stat.is_file(), &format!("{:?}", stat.file_type));
    }
    t.expect_ok("stat(fd)", h.stat(StatParams::descriptor(fd), None));

    let read = unsafe { h.read(fd, s.large.span(), OffsetT::START, None) };
    if let Some(n) = t.expect_ok("read", read) {
        let got = &s.large.as_slice()[..n.value() as usize];
        t.check("read content", got == payload, &String::from_utf8_lossy(got));
    }

    let parts = [
        OffHeapBuffer::with_data(b"vectored ").ok(),
        OffHeapBuffer::with_data(b"write").ok(),
    ];
    if let [Some(a), Some(b)] = parts {
        let sources = [a, b];
        let vector = OffHeapIoVector::writable(&sources);
        let wrote = unsafe { h.write_vector(fd, vector.span(), OffsetT::START, None) };
        if let Some(n) = t.expect_ok("writev", wrote) {
            t.check("writev length", n == SizeT(14), &n.to_string());
        }

        let into = OffHeapIoVector::readable(std::slice::from_ref(&s.large));
        let read = unsafe { h.read_vector(fd, into.span(), OffsetT::START, None) };
        if let Some(n) = t.expect_ok("readv", read) {
            let got = &s.large.as_slice()[..14];
            t.check("readv content", n.value() >= 14 && got == b"vectored write", &String::from_utf8_lossy(got));
        }
    }

    t.expect_ok("close", h.close(fd, None));
    let missing = h.open(OpenParams::new("/nonexistent/proactor"), None);
    t.expect_err("open(missing) → ENOENT", missing, |e| e.errno() == Some(libc::ENOENT));
    let _ = std::fs::remove_file(&path);
}

// ════════════════════════════════════════════════════════════
// Part C, Timeouts and splice
// ════════════════════════════════════════════════════════════

fn test_timeouts(t: &mut SmokeRun, h: &ProactorHandle, s: &mut Scratch) {
    t.section("Part C, Timeouts and splice");

    let (Some((rx, tx)), Some((rx2, tx2))) = (pipe(), pipe()) else {
        t.record("pipe2", Verdict::Fail("could not create pipes".into()));
        return;
    };

    let start = Instant::now();
    let guarded = unsafe { h.read(rx, s.large.span(), OffsetT::CURRENT, Some(Timeout::from_millis(30))) };
    if t.expect_err("guard cancels idle read", guarded, Failure::is_cancelled) {
        t.check("guard waited >= 30ms", start.elapsed() >= Duration::from_millis(30), &format!("{:?}", start.elapsed()));
    }

    s.small.fill(b"through the pipes");
    let wrote = unsafe { h.write(tx, s.small.used_span(), OffsetT::CURRENT, None) };
    t.expect_ok("write pipe", wrote);

    let moved = h.splice(SpliceDescriptor::new(rx, tx2, SizeT(17)), Some(Timeout::from_secs(1)));
    if let Some(n) = t.expect_ok("splice pipe → pipe", moved) {
        t.check("splice length", n == SizeT(17), &n.to_string());
    }

    let read = unsafe { h.read(rx2, s.large.span(), OffsetT::CURRENT, Some(Timeout::from_secs(1))) };
    if let Some(n) = t.expect_ok("read with disarmed guard", read) {
        let got = &s.large.as_slice()[..n.value() as usize];
        t.check("spliced content", got == b"through the pipes", &String::from_utf8_lossy(got));
    }

    for fd in [rx, tx, rx2, tx2] {
        let _ = h.close(fd, None).join_timeout(WAIT);
    }
}

// ════════════════════════════════════════════════════════════
// Part D, Network
// ════════════════════════════════════════════════════════════

fn test_network(t: &mut SmokeRun, h: &ProactorHandle, s: &mut Scratch) {
    t.section("Part D, Network (loopback)");

    let Ok(any) = "127.0.0.1:0".parse() else { return };
    let Some(listener) = t.expect_ok("listen 127.0.0.1:0", h.listen(ListenParams::new(any), None)) else {
        println!("       Skipping network tests (IORING_OP_SOCKET needs Linux 5.19+).");
        return;
    };
    t.check("bound port resolved", listener.address.port() != 0, &listener.address.to_string());

    let Some(client) = t.expect_ok("socket(AF_INET)", h.socket(SocketParams::stream(AddressFamily::Inet), None)) else {
        return;
    };

    let accepted = h.accept(listener.socket, SocketFlag::CLOSE_ON_EXEC, Some(Timeout::from_secs(5)));
    let connected = h.connect(client, listener.address, Some(Timeout::from_secs(5)));
    t.expect_ok("connect", connected);
    let Some(server) = t.expect_ok("accept", accepted) else { return };
    t.check("peer address decoded", server.peer.is_some(), "no peer");

    s.small.fill(b"hello over tcp");
    let wrote = unsafe { h.write(client, s.small.used_span(), OffsetT::CURRENT, None) };
    t.expect_ok("client write", wrote);
    let read = unsafe { h.read(server.socket, s.large.span(), OffsetT::CURRENT, Some(Timeout::from_secs(1))) };
    if let Some(n) = t.expect_ok("server read", read) {
        let got = &s.large.as_slice()[..n.value() as usize];
        t.check("tcp content", got == b"hello over tcp", &String::from_utf8_lossy(got));
    }

    for fd in [server.socket, client, listener.socket] {
        let _ = h.close(fd, None).join_timeout(WAIT);
    }
}

// ════════════════════════════════════════════════════════════
// Part E, Shutdown
// ════════════════════════════════════════════════════════════

fn test_shutdown(t: &mut SmokeRun, reactor: &mut Reactor, s: &Scratch) {
    t.section("Part E, Shutdown");

    let h = reactor.handle();
    let pending = pipe().map(|(rx, tx)| {
        let read = unsafe { h.read(rx, s.large.span(), OffsetT::CURRENT, None) };
        (read, rx, tx)
    });

    let terminated = reactor.shutdown();
    t.check("termination promise", terminated.join_timeout(WAIT) == Some(Ok(())), "not resolved");
    t.check("shutdown idempotent", h.shutdown().is_resolved(), "second promise pending");
    t.check("request after shutdown → Closed", h.nop().peek() == Some(Err(Failure::Closed)), "not Closed");

    if let Some((read, rx, tx)) = pending {
        t.check("in-flight read → Closed", read.peek() == Some(Err(Failure::Closed)), &format!("{:?}", read.peek()));
        unsafe {
            libc::close(rx.descriptor());
            libc::close(tx.descriptor());
        }
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    println!("=== Proactor End-to-End Smoke Test ===");
    let kver = std::fs::read_to_string("/proc/version").unwrap_or_default();
    println!("    kernel: {}", kver.trim().split(' ').nth(2).unwrap_or("?"));

    let mut t = SmokeRun::new();

    let (Ok(small), Ok(large)) = (OffHeapBuffer::fixed_size(64), OffHeapBuffer::fixed_size(4096)) else {
        println!("\nFATAL: could not allocate scratch buffers");
        std::process::exit(1);
    };
    let mut scratch = Scratch { small, large };

    let config = ProactorConfig::from_env();
    let mut reactor = match Reactor::start(config) {
        Ok(r) => r,
        Err(e) => {
            println!("\nFATAL: reactor failed to start: {}", e);
            t.summary();
            std::process::exit(1);
        }
    };
    let handle = reactor.handle();

    test_basics(&mut t, &handle, &scratch);
    test_files(&mut t, &handle, &mut scratch);
    test_timeouts(&mut t, &handle, &mut scratch);
    test_network(&mut t, &handle, &mut scratch);
    test_shutdown(&mut t, &mut reactor, &scratch);

    drop(reactor);
    t.summary();
    std::process::exit(if t.failed() > 0 { 1 } else { 0 });
}
