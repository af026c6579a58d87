//! Controller channel tests against a loopback fake controller.

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use lumen_config::ControllerConfig;
use lumen_engine::{ControllerChannel, EnqueueOutcome, OUTBOUND_QUEUE_CAP, SocketPool};
use lumen_wire::{DecodedFrame, LedColor, decode_stream};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const FRAME_LEN_4PX: usize = 24 + 4 * 3;

fn fake_controller() -> Result<(TcpListener, String), std::io::Error> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let host = listener.local_addr()?.to_string();
    Ok((listener, host))
}

fn accept(listener: &TcpListener) -> Result<TcpStream, std::io::Error> {
    let (stream, _) = listener.accept()?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    Ok(stream)
}

fn read_exact_len(stream: &mut TcpStream, len: usize) -> Result<Vec<u8>, std::io::Error> {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

fn channel(host: &str, pool: &Arc<SocketPool>, tweak: impl FnOnce(&mut ControllerConfig)) -> ControllerChannel {
    let mut config = ControllerConfig::new(host, "rail");
    tweak(&mut config);
    ControllerChannel::new(&config, 4, 21, Arc::clone(pool))
}

fn connect(channel: &ControllerChannel, last_batch: &mut Instant) {
    channel.service_once(Instant::now(), last_batch);
}

#[test]
fn test_frames_arrive_in_render_order() -> TestResult {
    let (listener, host) = fake_controller()?;
    let pool = Arc::new(SocketPool::new());
    let channel = channel(&host, &pool, |_| {});
    let mut last_batch = Instant::now();

    connect(&channel, &mut last_batch);
    assert!(channel.is_ready_for_data());

    let colors = [
        LedColor::new(1, 0, 0),
        LedColor::new(0, 2, 0),
        LedColor::new(0, 0, 3),
    ];
    for color in colors {
        assert_eq!(channel.enqueue(&[color; 4], SystemTime::now()), EnqueueOutcome::Accepted);
    }
    assert_eq!(channel.queue_depth(), 3);

    channel.service_once(Instant::now(), &mut last_batch);
    assert_eq!(channel.queue_depth(), 0);

    let mut server = accept(&listener)?;
    let bytes = read_exact_len(&mut server, 3 * FRAME_LEN_4PX)?;
    let frames = decode_stream(&bytes)?;
    let firsts: Vec<LedColor> = frames.iter().filter_map(|f| f.pixels.first().copied()).collect();
    assert_eq!(firsts, colors);

    let counters = channel.counters();
    assert_eq!(counters.batches_sent, 1);
    assert_eq!(counters.bytes_sent, (3 * FRAME_LEN_4PX) as u64);
    Ok(())
}

#[test]
fn test_playback_timestamp_leads_render_time() -> TestResult {
    let (listener, host) = fake_controller()?;
    let pool = Arc::new(SocketPool::new());
    let channel = channel(&host, &pool, |c| c.channel = 2);
    let mut last_batch = Instant::now();
    connect(&channel, &mut last_batch);

    let target = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    assert!(channel.enqueue(&[LedColor::BLACK; 4], target).is_accepted());
    channel.service_once(Instant::now(), &mut last_batch);

    let mut server = accept(&listener)?;
    let bytes = read_exact_len(&mut server, FRAME_LEN_4PX)?;
    let frames = decode_stream(&bytes)?;
    let Some(DecodedFrame { channel: ch, timestamp, .. }) = frames.first() else {
        return Err("no frame decoded".into());
    };
    assert_eq!(*ch, 2);
    // 21 frames per buffer at 21 fps: 0.70 s ahead
    let lead = timestamp.saturating_sub(Duration::from_secs(1_700_000_000));
    assert!(
        lead >= Duration::from_micros(699_999) && lead <= Duration::from_micros(700_001),
        "unexpected lead {lead:?}"
    );
    Ok(())
}

#[test]
fn test_compressed_swapped_reversed_frame() -> TestResult {
    let (listener, host) = fake_controller()?;
    let pool = Arc::new(SocketPool::new());
    let mut config = ControllerConfig::new(&host, "matrix");
    config.use_compression = true;
    config.swap_red_green = true;
    config.reversed = true;
    let channel = ControllerChannel::new(&config, 144, 21, Arc::clone(&pool));
    let mut last_batch = Instant::now();
    connect(&channel, &mut last_batch);

    let mut pixels = vec![LedColor::BLACK; 144];
    pixels[0] = LedColor::new(10, 20, 30);
    assert!(channel.enqueue(&pixels, SystemTime::now()).is_accepted());
    channel.service_once(Instant::now(), &mut last_batch);

    let mut server = accept(&listener)?;
    let sent = channel.counters().bytes_sent;
    assert!(sent > 0);
    assert!(sent < (24 + 144 * 3) as u64, "envelope should be smaller than the raw frame");
    let bytes = read_exact_len(&mut server, usize::try_from(sent)?)?;
    let frames = decode_stream(&bytes)?;
    let Some(frame) = frames.first() else {
        return Err("no frame decoded".into());
    };
    assert_eq!(frame.pixels.len(), 144);
    assert_eq!(frame.pixels.last(), Some(&LedColor::new(20, 10, 30)));
    Ok(())
}

#[test]
fn test_jammed_queue_is_purged_once_and_socket_reset() -> TestResult {
    let (_listener, host) = fake_controller()?;
    let pool = Arc::new(SocketPool::new());
    let channel = channel(&host, &pool, |_| {});
    let mut last_batch = Instant::now();
    connect(&channel, &mut last_batch);

    let pixels = [LedColor::BLACK; 4];
    for _ in 0..OUTBOUND_QUEUE_CAP {
        assert!(channel.enqueue(&pixels, SystemTime::now()).is_accepted());
    }
    assert_eq!(channel.enqueue(&pixels, SystemTime::now()), EnqueueOutcome::QueueFull);
    assert_eq!(channel.queue_depth(), OUTBOUND_QUEUE_CAP);
    assert!(!channel.is_ready_for_data());

    channel.service_once(Instant::now(), &mut last_batch);
    assert_eq!(channel.queue_depth(), 0);
    assert!(pool.is_empty());

    let counters = channel.counters();
    assert_eq!(counters.queue_purges, 1);
    assert_eq!(counters.frames_dropped, 1);
    assert_eq!(counters.socket_resets, 1);
    assert_eq!(counters.batches_sent, 0);
    Ok(())
}

#[test]
fn test_failed_send_blocks_data_until_reconnect() -> TestResult {
    let (listener, host) = fake_controller()?;
    let pool = Arc::new(SocketPool::new());
    let channel = channel(&host, &pool, |_| {});
    let mut last_batch = Instant::now();
    connect(&channel, &mut last_batch);
    assert!(channel.is_ready_for_data());

    // The controller hangs up before any data arrives.
    drop(accept(&listener)?);
    thread::sleep(Duration::from_millis(100));

    assert!(channel.enqueue(&[LedColor::BLACK; 4], SystemTime::now()).is_accepted());
    channel.service_once(Instant::now(), &mut last_batch);
    assert!(!channel.is_ready_for_data());

    // Dead socket is discarded, and a replacement waits out the retry interval.
    let failed_at = Instant::now();
    channel.service_once(failed_at, &mut last_batch);
    assert!(pool.is_empty());
    assert!(!channel.is_ready_for_data());

    channel.service_once(failed_at + Duration::from_secs(2), &mut last_batch);
    assert!(channel.is_ready_for_data());
    Ok(())
}

#[test]
fn test_readiness_does_not_wait_for_a_stalled_send() -> TestResult {
    // Never accepted or read, so a large batch fills the socket buffers.
    let (_listener, host) = fake_controller()?;
    let pool = Arc::new(SocketPool::new());
    let channel = channel(&host, &pool, |_| {});
    let mut last_batch = Instant::now();
    connect(&channel, &mut last_batch);
    assert!(channel.is_ready_for_data());

    let Some(socket) = pool.get(&host) else {
        return Err("no pooled socket".into());
    };
    let (locked_tx, locked_rx) = mpsc::channel();
    let sender = thread::spawn(move || {
        let mut socket = socket.lock();
        if locked_tx.send(()).is_err() {
            return false;
        }
        let payload = vec![0u8; 64 * 1024 * 1024];
        socket.send(&payload, Instant::now()).is_err()
    });
    locked_rx.recv()?;

    let started = Instant::now();
    let ready = channel.is_ready_for_data();
    let status = channel.status();
    let took = started.elapsed();
    assert!(took < Duration::from_millis(50), "readiness took {took:?}");
    assert!(ready);
    assert!(status.connected);

    let failed = sender.join().map_err(|_panic| "sender thread panicked")?;
    assert!(failed, "a send that cannot drain should fail");
    assert!(!channel.is_ready_for_data());
    Ok(())
}

#[test]
fn test_worker_thread_streams_and_stops() -> TestResult {
    let (listener, host) = fake_controller()?;
    let pool = Arc::new(SocketPool::new());
    let channel = channel(&host, &pool, |_| {});
    channel.start()?;
    assert!(channel.is_running());

    let deadline = Instant::now() + Duration::from_secs(5);
    while !channel.is_ready_for_data() {
        if Instant::now() > deadline {
            return Err("worker never connected".into());
        }
        thread::sleep(Duration::from_millis(10));
    }

    assert!(channel.enqueue(&[LedColor::new(9, 8, 7); 4], SystemTime::now()).is_accepted());
    let mut server = accept(&listener)?;
    let bytes = read_exact_len(&mut server, FRAME_LEN_4PX)?;
    let frames = decode_stream(&bytes)?;
    assert_eq!(frames.first().map(|f| f.pixels.clone()), Some(vec![LedColor::new(9, 8, 7); 4]));

    channel.stop();
    assert!(!channel.is_running());
    Ok(())
}

#[test]
fn test_channels_to_one_host_share_a_socket() -> TestResult {
    let (_listener, host) = fake_controller()?;
    let pool = Arc::new(SocketPool::new());
    let left = channel(&host, &pool, |c| c.width = 2);
    let right = channel(&host, &pool, |c| {
        c.offset = 2;
        c.width = 2;
    });
    let mut last_batch = Instant::now();

    connect(&left, &mut last_batch);
    assert!(left.is_ready_for_data());
    assert!(right.is_ready_for_data());
    assert_eq!(pool.len(), 1);
    Ok(())
}
