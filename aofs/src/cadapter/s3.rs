//! S3 适配器：基于 aws-sdk-s3 的实现，小对象直接 PutObject，大对象走分段上传，带基础重试与校验。

use crate::cadapter::client::{ObjectBackend, StoreError};
use async_trait::async_trait;
use aws_config::{
    BehaviorVersion, Region, environment::EnvironmentVariableCredentialsProvider,
    timeout::TimeoutConfig,
};
use aws_sdk_s3::{
    Client,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::{
    io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::{Duration, sleep},
};

/// S3 后端配置选项
#[derive(Debug, Clone)]
pub struct S3Config {
    /// 自定义 endpoint（MinIO / rustfs 等 S3 兼容服务），None 表示 AWS 默认
    pub endpoint: Option<String>,
    pub region: String,
    /// S3 兼容服务通常需要 path-style 寻址
    pub force_path_style: bool,
    /// 分段大小（字节），建议 8-64MiB
    pub part_size: usize,
    /// 最大并发分段上传数
    pub max_concurrency: usize,
    /// 最大重试次数
    pub max_retries: u32,
    /// 初始重试延迟（毫秒）
    pub initial_retry_delay_ms: u64,
    /// 单次请求超时时间
    pub timeout: Duration,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            force_path_style: false,
            part_size: 8 * 1024 * 1024, // 8MB
            max_concurrency: 8,
            max_retries: 3,
            initial_retry_delay_ms: 100,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct S3Backend {
    client: Client,
    config: S3Config,
}

impl S3Backend {
    pub async fn new(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(EnvironmentVariableCredentialsProvider::new())
            .region(Region::new(config.region.clone()))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_attempt_timeout(config.timeout)
                    .build(),
            );
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let conf = loader.load().await;
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf)
            .force_path_style(config.force_path_style)
            .build();
        Self {
            client: Client::from_conf(s3_conf),
            config,
        }
    }

    pub fn config(&self) -> &S3Config {
        &self.config
    }

    fn md5_base64(data: &[u8]) -> String {
        let sum = md5::compute(data);
        B64.encode(sum.0)
    }

    async fn execute_with_retry<T, F, Fut, E>(
        &self,
        operation: F,
        operation_name: &'static str,
    ) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut attempt = 0;
        let max_retries = self.config.max_retries;
        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if attempt > max_retries => {
                    tracing::warn!("{operation_name} failed after {attempt} attempts: {e}");
                    return Err(StoreError::backend(e));
                }
                Err(e) => {
                    let delay_ms = self.config.initial_retry_delay_ms * 2u64.pow(attempt - 1);
                    tracing::debug!("{operation_name} attempt {attempt} failed, retrying in {delay_ms}ms: {e}");
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    async fn put_single(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), StoreError> {
        let checksum = Self::md5_base64(&data);
        self.execute_with_retry(
            || {
                self.client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .content_md5(checksum.clone())
                    .body(ByteStream::from(data.clone()))
                    .send()
            },
            "put_object",
        )
        .await?;
        Ok(())
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> Result<CompletedPart, StoreError> {
        let checksum = Self::md5_base64(&data);
        let resp = self
            .execute_with_retry(
                || {
                    self.client
                        .upload_part()
                        .bucket(bucket)
                        .key(key)
                        .upload_id(upload_id)
                        .part_number(part_number)
                        .content_md5(checksum.clone())
                        .body(ByteStream::from(data.clone()))
                        .send()
                },
                "upload_part",
            )
            .await?;
        Ok(CompletedPart::builder()
            .part_number(part_number)
            .set_e_tag(resp.e_tag().map(|s| s.to_string()))
            .build())
    }

    /// 按顺序读取分片并上传，最多 `max_concurrency` 个分片同时在途。
    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        first: Bytes,
        second: Bytes,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<Vec<CompletedPart>, StoreError> {
        let max_in_flight = self.config.max_concurrency.max(1);
        let mut in_flight = FuturesUnordered::new();
        let mut completed = Vec::new();
        let mut part_number = 1i32;
        let mut part = first;
        let mut lookahead = Some(second);

        loop {
            in_flight.push(self.upload_part(bucket, key, upload_id, part_number, part));
            part_number += 1;
            if in_flight.len() >= max_in_flight {
                if let Some(done) = in_flight.next().await {
                    completed.push(done?);
                }
            }
            part = match lookahead.take() {
                Some(next) => next,
                None => {
                    let next = read_part(body, self.config.part_size).await?;
                    if next.is_empty() {
                        break;
                    }
                    next
                }
            };
        }
        while let Some(done) = in_flight.next().await {
            completed.push(done?);
        }
        completed.sort_by_key(|p| p.part_number());
        Ok(completed)
    }

    async fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        first: Bytes,
        second: Bytes,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), StoreError> {
        let create = self
            .execute_with_retry(
                || {
                    self.client
                        .create_multipart_upload()
                        .bucket(bucket)
                        .key(key)
                        .send()
                },
                "create_multipart_upload",
            )
            .await?;
        let upload_id = create
            .upload_id()
            .ok_or_else(|| StoreError::Backend("multipart upload id missing".into()))?
            .to_string();

        let parts = match self
            .upload_parts(bucket, key, &upload_id, first, second, body)
            .await
        {
            Ok(parts) => parts,
            Err(e) => {
                // 失败时中止分段上传，避免残留分片占用存储
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!("failed to abort multipart upload {upload_id}: {abort_err}");
                }
                return Err(e);
            }
        };

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();
        self.execute_with_retry(
            || {
                self.client
                    .complete_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed.clone())
                    .send()
            },
            "complete_multipart_upload",
        )
        .await?;
        Ok(())
    }
}

/// 读取至多 `part_size` 字节；返回空表示已到 EOF。
async fn read_part(
    body: &mut (dyn AsyncRead + Send + Unpin),
    part_size: usize,
) -> io::Result<Bytes> {
    let mut buf = Vec::with_capacity(part_size);
    (&mut *body)
        .take(part_size as u64)
        .read_to_end(&mut buf)
        .await?;
    Ok(Bytes::from(buf))
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, StoreError> {
        let resp = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(o) => o,
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_no_such_key()) =>
            {
                return Err(StoreError::not_found(bucket, key));
            }
            Err(e) => return Err(StoreError::backend(e)),
        };
        let mut body = resp.body.into_async_read();
        let n = io::copy(&mut body, sink).await?;
        sink.flush().await?;
        Ok(n)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), StoreError> {
        // 小对象直接 put_object；超过一个分片的对象走 multipart。
        let part_size = self.config.part_size.max(1);
        let first = read_part(body, part_size).await?;
        let second = if first.len() < part_size {
            Bytes::new()
        } else {
            read_part(body, part_size).await?
        };
        if second.is_empty() {
            return self.put_single(bucket, key, first).await;
        }
        self.put_multipart(bucket, key, first, second, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_part_splits_body() {
        let mut body: &[u8] = b"0123456789";
        let a = read_part(&mut body, 4).await.unwrap();
        let b = read_part(&mut body, 4).await.unwrap();
        let c = read_part(&mut body, 4).await.unwrap();
        let d = read_part(&mut body, 4).await.unwrap();
        assert_eq!(&a[..], b"0123");
        assert_eq!(&b[..], b"4567");
        assert_eq!(&c[..], b"89");
        assert!(d.is_empty());
    }

    #[test]
    fn test_md5_base64() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(S3Backend::md5_base64(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
    }

    // 需要本地 S3 兼容服务（如 MinIO）以及 AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY。
    #[tokio::test]
    #[ignore]
    async fn test_s3_backend() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let config = S3Config {
            endpoint: Some("http://127.0.0.1:9000/".to_string()),
            force_path_style: true,
            ..S3Config::default()
        };
        let backend = S3Backend::new(config).await;
        let mut data_1: &[u8] = b"hello";
        backend.put_object("main", "test_0", &mut data_1).await?;

        let mut res = Vec::new();
        backend.get_object("main", "test_0", &mut res).await?;
        assert_eq!(res, b"hello");

        let err = backend
            .get_object("main", "test_missing", &mut res)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }
}
