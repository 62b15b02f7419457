// Copyright 2025 IsoTailor Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! End-to-end tests of the wire protocol against a real socket.

use isotailor_core::trace::TraceFormat;
use isotailor_learn::bayes::NaiveBayesClassifier;
use isotailor_learn::rule::RuleBasedClassifier;
use isotailor_learn::store::ModelStore;
use isotailor_server::{
    ClassifierBank, Dispatcher, PredictionService, TrainingService, TRAIN_FINISHED_REPLY,
};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

async fn start_server(model_dir: &Path) -> (std::net::SocketAddr, JoinHandle<anyhow::Result<()>>) {
    let format = TraceFormat::default();
    let store = ModelStore::new(model_dir);
    let bank = ClassifierBank {
        rule: Box::new(RuleBasedClassifier),
        bayes: Box::new(NaiveBayesClassifier::default()),
        graphnet: None,
    };
    let training = TrainingService::new("ycsb", format, store.clone(), bank);
    let prediction =
        PredictionService::new("ycsb", format, store, Box::new(RuleBasedClassifier));

    let dispatcher = Dispatcher::bind("127.0.0.1:0").await.expect("bind");
    let addr = dispatcher.local_addr().expect("addr");
    let handle = tokio::spawn(dispatcher.serve(training, prediction));
    (addr, handle)
}

async fn request(stream: &mut TcpStream, message: &str) -> String {
    stream
        .write_all(message.as_bytes())
        .await
        .expect("send request");
    let mut buf = vec![0u8; 1024];
    let n = stream.read(&mut buf).await.expect("read reply");
    String::from_utf8(buf[..n].to_vec()).expect("utf8 reply")
}

#[tokio::test]
async fn liveness_predict_and_training_over_one_connection() {
    let models = tempfile::tempdir().expect("tempdir");
    let data = tempfile::tempdir().expect("tempdir");

    // writes=30, reads=10 -> write ratio 0.75 -> RC_TAILOR (index 2).
    let trace_path = data.path().join("sample.trace");
    std::fs::write(&trace_path, "1,10,30\n").expect("write trace");

    // One labeled scenario for the offline phase.
    let scenario = data.path().join("scenarios").join("s0");
    std::fs::create_dir_all(&scenario).expect("mkdir");
    std::fs::write(scenario.join("label"), "0.5,1.0,0.25").expect("label");
    std::fs::write(scenario.join("t.trace"), "1,9,1\n").expect("trace");

    let (addr, handle) = start_server(models.path()).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");

    // Liveness probe: fixed literal plus newline.
    let reply = request(&mut stream, "online,ok,probe\n").await;
    assert_eq!(reply, "ok\n");

    // Prediction: strategy index plus newline.
    let reply = request(
        &mut stream,
        &format!("online,predict,{}\n", trace_path.display()),
    )
    .await;
    assert_eq!(reply, "2\n");

    // Training: fixed reply, no trailing newline.
    let reply = request(
        &mut stream,
        &format!(
            "offline,train_rule,{}\n",
            data.path().join("scenarios").display()
        ),
    )
    .await;
    assert_eq!(reply, TRAIN_FINISHED_REPLY);

    // Peer close ends the serving loop cleanly.
    drop(stream);
    handle
        .await
        .expect("serve task")
        .expect("serve exits cleanly");
}

#[tokio::test]
async fn training_failures_still_get_the_fixed_reply() {
    let models = tempfile::tempdir().expect("tempdir");
    let (addr, handle) = start_server(models.path()).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");

    // The scenario root does not exist; training fails but the wire
    // contract does not change.
    let reply = request(&mut stream, "offline,train_rule,/does/not/exist\n").await;
    assert_eq!(reply, TRAIN_FINISHED_REPLY);

    drop(stream);
    handle
        .await
        .expect("serve task")
        .expect("serve exits cleanly");
}

#[tokio::test]
async fn malformed_requests_are_skipped_without_reply() {
    let models = tempfile::tempdir().expect("tempdir");
    let (addr, handle) = start_server(models.path()).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");

    // Unknown phase: no reply. The next well-formed request is answered.
    stream
        .write_all(b"sideways,predict,x\n")
        .await
        .expect("send");
    // Let the server drain the bad message before the next one so the
    // two writes cannot coalesce into a single read.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let reply = request(&mut stream, "online,ok,probe\n").await;
    assert_eq!(reply, "ok\n");

    drop(stream);
    handle
        .await
        .expect("serve task")
        .expect("serve exits cleanly");
}

#[tokio::test]
async fn fatal_online_errors_terminate_the_connection() {
    let models = tempfile::tempdir().expect("tempdir");
    let (addr, handle) = start_server(models.path()).await;
    let mut stream = TcpStream::connect(addr).await.expect("connect");

    stream
        .write_all(b"online,predict,/does/not/exist\n")
        .await
        .expect("send");

    let result = handle.await.expect("serve task");
    assert!(result.is_err(), "missing trace file must be fatal");

    // The peer observes the close as an empty read (or a reset).
    let mut buf = [0u8; 16];
    let n = stream.read(&mut buf).await.unwrap_or(0);
    assert_eq!(n, 0);
}
