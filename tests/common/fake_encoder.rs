#![allow(dead_code)]

// A stand-in for ffmpeg. The script picks out the `-i` source and the
// output path, then sources the "video" file itself as shell, so each test
// file decides how its own encode behaves. `$out` is the output path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use videoslim::engine::{
    BatchRunner, BuiltinProfiles, Compressor, EncoderProgram, EventReceiver, ProcessRegistry,
    ProfileStore, events,
};

const ENCODER_SCRIPT: &str = r#"src=""
prev=""
for arg do
    if [ "$prev" = "-i" ]; then
        src="$arg"
    fi
    prev="$arg"
done
out="$prev"
. "$src"
"#;

/// Behavior of a well-behaved 10 second encode
pub const SUCCESS: &str = r#"echo "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from '$src':"
echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 1000 kb/s"
printf 'frame=  120 fps=0.0 q=28.0 size=     256kB time=00:00:05.00 bitrate= 419.4kbits/s speed=10x\r'
touch "$out"
exit 0
"#;

/// Behavior of an encode that fails with exit code 1
pub const FAILURE: &str = r#"echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 1000 kb/s"
echo "Error while decoding stream #0:0: Invalid data found when processing input" >&2
exit 1
"#;

/// Behavior of an encode that runs until stopped
pub const HANGS: &str = r#"echo "  Duration: 00:10:00.00, start: 0.000000, bitrate: 1000 kb/s"
exec sleep 30
"#;

/// Behavior of an encode whose work runs in a child of the shell, as with a
/// wrapper script around ffmpeg
pub const HANGS_IN_CHILD: &str = r#"echo "  Duration: 00:10:00.00, start: 0.000000, bitrate: 1000 kb/s"
sleep 30
"#;

/// Behavior of a clean encode that leaves a helper holding its output open
pub const LEAVES_HELPER: &str = r#"echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 1000 kb/s"
sleep 5 &
touch "$out"
exit 0
"#;

/// Scratch directory with a fake encoder in it
pub struct FakeEncoder {
    pub dir: TempDir,
    pub script: PathBuf,
}

impl FakeEncoder {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let script = dir.path().join("fake-ffmpeg.sh");
        fs::write(&script, ENCODER_SCRIPT).expect("write encoder script");
        Self { dir, script }
    }

    /// Run through /bin/sh so the script needs no exec bit
    pub fn program(&self) -> EncoderProgram {
        EncoderProgram::new(&self.script).with_launcher(["/bin/sh"])
    }

    /// Create a source "video" whose encode runs `behavior`
    pub fn video(&self, name: &str, behavior: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, behavior).expect("write fake video");
        path
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Compressor wired to this encoder with built-in profiles
    pub fn compressor(&self, registry: ProcessRegistry) -> (Compressor, EventReceiver) {
        self.compressor_with(registry, Arc::new(BuiltinProfiles))
    }

    pub fn compressor_with(
        &self,
        registry: ProcessRegistry,
        profiles: Arc<dyn ProfileStore>,
    ) -> (Compressor, EventReceiver) {
        let (tx, rx) = events::channel();
        let compressor = Compressor::new(self.program(), profiles, registry, tx)
            .with_progress_interval(Duration::ZERO);
        (compressor, rx)
    }

    /// Batch runner whose scratch file lives in the temp dir
    pub fn runner(&self, registry: ProcessRegistry) -> (BatchRunner, EventReceiver) {
        let (tx, rx) = events::channel();
        let compressor = Compressor::new(self.program(), Arc::new(BuiltinProfiles), registry, tx.clone())
            .with_progress_interval(Duration::ZERO);
        let runner = BatchRunner::new(compressor, tx)
            .with_scratch_files(vec![self.dir.path().join("pre_temp.mp4")]);
        (runner, rx)
    }
}

/// Short timeouts so stop tests finish quickly
pub fn quick_registry() -> ProcessRegistry {
    ProcessRegistry::with_timeouts(Duration::from_secs(2), Duration::from_secs(1))
}

/// Poll until `check` holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    check()
}
