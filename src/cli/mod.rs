//! CLI 모듈
//!
//! kb-answer CLI 명령어 정의 및 구현

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::knowledge::KbStore;
use crate::server;
use crate::service::{QueryService, Reply};
use crate::source::{load_with_timeout, source_from_location};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "kb-answer")]
#[command(version, about = "FAQ 지식베이스 응답 엔진", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// KB 위치 공통 옵션
#[derive(clap::Args, Debug, Clone, Default)]
pub struct KbArgs {
    /// KB 위치 (JSON/CSV 파일 경로 또는 URL, 기본: KB_ANSWER_KB)
    #[arg(short, long)]
    pub kb: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 질문에 대한 KB 답변 조회
    Query {
        /// 사용자 질문
        query: String,

        #[command(flatten)]
        kb: KbArgs,

        /// 신뢰 임계값 (0.0 ~ 1.0)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// 1차 매칭 실패 시 부분 문자열 폴백 사용
        #[arg(long)]
        substring_fallback: bool,

        /// 위젯용 HTML로 출력
        #[arg(long)]
        html: bool,
    },

    /// KB 로드 및 검증 결과 확인
    Check {
        #[command(flatten)]
        kb: KbArgs,
    },

    /// KB 엔트리 목록
    List {
        #[command(flatten)]
        kb: KbArgs,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// HTTP 채팅 서버 실행
    Serve {
        #[command(flatten)]
        kb: KbArgs,

        /// 바인드 주소 (기본: KB_ANSWER_ADDR)
        #[arg(short, long)]
        addr: Option<SocketAddr>,
    },
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env().context("환경변수 설정 오류")?;

    match cli.command {
        Commands::Query {
            query,
            kb,
            threshold,
            substring_fallback,
            html,
        } => {
            apply_kb(&mut config, kb);
            if let Some(t) = threshold {
                config.threshold = t;
            }
            config.substring_fallback |= substring_fallback;
            cmd_query(&config, &query, html).await
        }
        Commands::Check { kb } => {
            apply_kb(&mut config, kb);
            cmd_check(&config).await
        }
        Commands::List { kb, limit } => {
            apply_kb(&mut config, kb);
            cmd_list(&config, limit).await
        }
        Commands::Serve { kb, addr } => {
            apply_kb(&mut config, kb);
            if let Some(addr) = addr {
                config.addr = addr;
            }
            cmd_serve(&config).await
        }
    }
}

fn apply_kb(config: &mut Config, args: KbArgs) {
    if let Some(kb) = args.kb {
        config.kb_location = kb;
    }
}

/// 설정된 위치에서 KB 로드
async fn load_store(config: &Config) -> Result<KbStore> {
    let provider = source_from_location(&config.kb_location)
        .with_context(|| format!("KB 소스 생성 실패: {}", config.kb_location))?;

    load_with_timeout(provider.as_ref(), config.load_timeout)
        .await
        .with_context(|| format!("KB 로드 실패: {}", config.kb_location))
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 질문 명령어 (query)
async fn cmd_query(config: &Config, query: &str, html: bool) -> Result<()> {
    let service_config = config.service_config().context("매칭 설정 오류")?;
    let store = load_store(config).await?;
    let service = QueryService::new(Arc::new(store), service_config);

    let reply = service.answer(query);

    match &reply {
        Reply::Answer {
            score,
            method,
            source_url,
            ..
        } => {
            println!("[OK] 매칭됨 (점수: {:.4}, 방식: {:?})", score, method);
            if let Some(url) = source_url {
                println!("     출처: {}", url);
            }
        }
        Reply::Handoff { .. } => {
            println!("[!] 신뢰할 만한 답변이 없습니다 (임계값: {:.2})", config.threshold);
        }
    }
    println!();

    if html {
        println!("{}", reply.to_html());
    } else {
        println!("{}", reply.text());
    }

    Ok(())
}

/// 검증 명령어 (check)
///
/// KB를 로드하고 검증 통계를 출력합니다.
async fn cmd_check(config: &Config) -> Result<()> {
    println!("[*] KB 위치: {}", config.kb_location);

    let store = load_store(config).await?;
    let report = store.report();

    println!("[OK] 검색 가능 엔트리: {} 건", store.len());
    println!("     원본 레코드: {}", report.total_records);
    println!("     draft 제외: {}", report.drafts_dropped);
    println!("     형식 오류 제외: {}", report.malformed_dropped);
    println!("     aliases 보정: {}", report.aliases_coerced);
    println!("     답변 없음: {}", report.unanswered);

    let metadata = store.metadata();
    if let Some(ref source) = metadata.source {
        println!("     source: {}", source);
    }
    if let Some(ref generated) = metadata.generated {
        println!("     generated: {}", generated);
    }

    let alias_count: usize = store.entries().iter().map(|e| e.aliases.len()).sum();
    let with_source = store
        .entries()
        .iter()
        .filter(|e| e.source_url.is_some())
        .count();
    println!("     별칭 합계: {}, 출처 링크 보유: {}", alias_count, with_source);
    println!(
        "     로드 시각: {}",
        store.loaded_at().format("%Y-%m-%d %H:%M:%S UTC")
    );

    if report.malformed_dropped > 0 {
        println!();
        println!("[!] 일부 레코드가 제외되었습니다. 위 WARN 로그에서 레코드 번호를 확인하세요.");
    }

    Ok(())
}

/// 목록 명령어 (list)
async fn cmd_list(config: &Config, limit: usize) -> Result<()> {
    let store = load_store(config).await?;

    if store.is_empty() {
        println!("[!] 검색 가능한 엔트리가 없습니다.");
        return Ok(());
    }

    println!("[OK] KB 엔트리 ({} / {} 건):\n", limit.min(store.len()), store.len());

    for (i, entry) in store.entries().iter().take(limit).enumerate() {
        let id = entry.id.as_deref().unwrap_or("-");
        println!("  {:<4} [{}] [{}] {}", i + 1, id, entry.status, truncate_text(&entry.question, 60));
        for alias in &entry.aliases {
            println!("        ~ {}", truncate_text(alias, 60));
        }
        match &entry.answer {
            Some(answer) => println!("        -> {}", truncate_text(answer, 80)),
            None => println!("        -> (답변 없음, 매칭 시 연결 안내)"),
        }
        println!();
    }

    Ok(())
}

/// 서버 명령어 (serve)
async fn cmd_serve(config: &Config) -> Result<()> {
    let service_config = config.service_config().context("매칭 설정 오류")?;

    // 로드 완료 후에만 요청을 받음
    let store = load_store(config).await?;
    let service = Arc::new(QueryService::new(Arc::new(store), service_config));

    println!("[*] http://{}/api/chat 에서 대기 중 (Ctrl+C로 종료)", config.addr);
    server::serve(service, config.addr).await
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================
