//! BreathDx操作员命令行

use anyhow::{Context, Result};
use breathdx_admin::{init_logging, ConfigManager};
use breathdx_core::utils::display_timestamp;
use breathdx_core::{Metrics, MonitoringTarget, Patient};
use breathdx_export::{session_workbook, subsession_workbook, ExportWriter, SessionExport};
use breathdx_store::paths::is_document_id;
use breathdx_store::RestDocumentStore;
use breathdx_workflow::{
    operator_message, AcquisitionOutcome, AcquisitionProgress, ClinicWorkflow, PatientForm,
    SessionForm,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// BreathDx命令行参数
#[derive(Parser, Debug)]
#[command(name = "breathdx")]
#[command(about = "BreathDx 呼气检测门诊客户端")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别（覆盖配置）
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 按患者编号登录
    Login {
        #[arg(long, value_parser = document_id)]
        patient_id: String,
    },
    /// 登记新患者
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: String,
        #[arg(long)]
        sex: String,
        #[arg(long)]
        mobile: String,
        #[arg(long)]
        married: String,
    },
    /// 会话列表；指定会话时列出子会话结果与读数
    Dashboard {
        #[arg(long, value_parser = document_id)]
        patient_id: String,
        #[arg(long, value_parser = document_id)]
        session: Option<String>,
    },
    /// 创建会话并运行第一次采集
    StartSession {
        #[arg(long, value_parser = document_id)]
        patient_id: String,
        #[arg(long)]
        meal_time: String,
        #[arg(long)]
        alcohol: String,
        #[arg(long)]
        blood_glucose: String,
        #[arg(long)]
        duration: String,
    },
    /// 对已有子会话运行采集（Ctrl-C 取消）
    Acquire {
        #[arg(long, value_parser = document_id)]
        patient_id: String,
        #[arg(long, value_parser = document_id)]
        session: String,
        #[arg(long, value_parser = document_id)]
        subsession: String,
    },
    /// 计算子会话结果
    Results {
        #[arg(long, value_parser = document_id)]
        patient_id: String,
        #[arg(long, value_parser = document_id)]
        session: String,
        #[arg(long, value_parser = document_id)]
        subsession: String,
    },
    /// 在同一会话下重新采集
    Retake {
        #[arg(long, value_parser = document_id)]
        patient_id: String,
        #[arg(long, value_parser = document_id)]
        session: String,
    },
    /// 汇总会话并请求设备显示
    Summary {
        #[arg(long, value_parser = document_id)]
        patient_id: String,
        #[arg(long, value_parser = document_id)]
        session: String,
        /// 撤销设备显示请求
        #[arg(long)]
        clear: bool,
    },
    /// 对比两次会话，格式 `P-1/sessionID_001`；只给患者编号时列出可对比的会话
    Compare {
        #[arg(long, value_parser = document_id)]
        patient_id: Option<String>,
        #[arg(long)]
        first: Option<SessionRef>,
        #[arg(long)]
        second: Option<SessionRef>,
    },
    /// 导出会话或子会话数据
    Export {
        #[arg(long, value_parser = document_id)]
        patient_id: String,
        #[arg(long, value_parser = document_id)]
        session: String,
        /// 不指定时导出整个会话的工作簿
        #[arg(long, value_parser = document_id)]
        subsession: Option<String>,
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
    },
    /// 查看或修改配置文件
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// 输出当前生效的配置
    Show,
    /// 读取一项配置，如 `acquisition.tick_millis`
    Get { key: String },
    /// 修改一项配置并写回 `--config` 指定的文件
    Set { key: String, value: String },
    /// 把当前生效的配置写入 `--config` 指定的文件
    Save,
}

/// 会话引用，格式 `P-1/sessionID_001`
#[derive(Clone, Debug, PartialEq, Eq)]
struct SessionRef {
    patient_id: String,
    session_id: String,
}

impl FromStr for SessionRef {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((patient_id, session_id))
                if is_document_id(patient_id) && is_document_id(session_id) =>
            {
                Ok(Self {
                    patient_id: patient_id.to_string(),
                    session_id: session_id.to_string(),
                })
            }
            _ => Err(format!("expected PATIENT/SESSION such as P-1/sessionID_001, got '{}'", s)),
        }
    }
}

fn document_id(s: &str) -> std::result::Result<String, String> {
    if is_document_id(s) {
        Ok(s.to_string())
    } else {
        Err(format!("'{}' is not a valid identifier", s))
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Csv,
    Workbook,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let manager = ConfigManager::new(args.config.as_deref())?;
    let config = manager.get_config().await;

    // 初始化日志
    let mut logging = config.logging.clone();
    if let Some(level) = &args.log_level {
        logging.level = level.clone();
    }
    init_logging(&logging)?;

    if let Command::Config { action } = &args.command {
        return configure(&manager, action).await;
    }

    let store = RestDocumentStore::new(config.store.to_rest_config())
        .context("Failed to create document store client")?;
    info!("Using document store {}", store.documents_url());

    let mut workflow = ClinicWorkflow::new(Arc::new(store), config.acquisition.workflow_settings());
    let writer = ExportWriter::new(&config.export.output_dir);

    if let Err(err) = run(&mut workflow, &writer, args.command).await {
        match err.downcast_ref::<breathdx_core::BreathDxError>() {
            Some(workflow_err) => eprintln!("{}", operator_message(workflow_err)),
            None => eprintln!("{:#}", err),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(workflow: &mut ClinicWorkflow, writer: &ExportWriter, command: Command) -> Result<()> {
    match command {
        Command::Login { patient_id } => {
            let login = workflow.login(&patient_id).await?;
            print_patient(&login.patient);
            println!("Sessions: {}", login.session_count);
        }
        Command::Register {
            name,
            age,
            sex,
            mobile,
            married,
        } => {
            let form = PatientForm {
                name,
                age,
                sex,
                mobile,
                married,
            };
            let registration = workflow.register_patient(&form).await?;
            if registration.existing {
                println!("Existing patient found: {}", registration.patient.id);
            } else {
                println!("Patient created: {}", registration.patient.id);
            }
        }
        Command::Dashboard { patient_id, session } => {
            let patient = workflow.login(&patient_id).await?.patient;
            print_patient(&patient);
            for overview in workflow.dashboard(&patient.id).await {
                let s = &overview.session;
                println!(
                    "{}  created {}  subsessions {}  {}",
                    s.id,
                    display_timestamp(s.created_at.as_ref()),
                    overview.subsession_count,
                    if s.has_result() { "result available" } else { "pending" }
                );
            }
            if let Some(session_id) = session {
                for detail in workflow.session_details(&patient.id, &session_id).await {
                    println!(
                        "  {}  readings {}",
                        detail.subsession.id,
                        detail.readings.len()
                    );
                    if let Some(metrics) = &detail.subsession.metrics {
                        print_metrics("    ", metrics);
                    }
                }
            }
        }
        Command::StartSession {
            patient_id,
            meal_time,
            alcohol,
            blood_glucose,
            duration,
        } => {
            let patient = workflow.login(&patient_id).await?.patient;
            let form = SessionForm {
                meal_time,
                alcohol_consumption: alcohol,
                blood_glucose,
                session_duration: duration,
            };
            let handle = workflow.start_session(&patient, &form).await?;
            println!(
                "Session {} created, starting {}",
                handle.target.session_id, handle.target.subsession_id
            );
            acquire_and_compute(workflow, &handle.target).await?;
        }
        Command::Acquire {
            patient_id,
            session,
            subsession,
        } => {
            let target = MonitoringTarget::new(patient_id, session, subsession);
            acquire_and_compute(workflow, &target).await?;
        }
        Command::Results {
            patient_id,
            session,
            subsession,
        } => {
            let target = MonitoringTarget::new(patient_id, session, subsession);
            compute(workflow, &target).await?;
        }
        Command::Retake {
            patient_id,
            session,
        } => {
            let patient = workflow.login(&patient_id).await?.patient;
            let handle = workflow.retake(&patient, &session).await?;
            println!("Retake {} ({})", handle.target.subsession_id, handle.number);
            acquire_and_compute(workflow, &handle.target).await?;
        }
        Command::Summary {
            patient_id,
            session,
            clear,
        } => {
            if clear {
                workflow.leave_results().await;
                println!("Display request cleared");
                return Ok(());
            }
            let patient = workflow.login(&patient_id).await?.patient;
            let summary = workflow.summarize_session(&patient, &session).await?;
            match &summary.metrics {
                Some(metrics) => {
                    println!(
                        "Session {} over {} completed subsessions",
                        summary.session_id,
                        summary.completed.len()
                    );
                    print_metrics("  ", metrics);
                    if summary.display_requested {
                        println!("Results sent to the device display");
                    } else {
                        println!("Results saved, but failed to send to the device. Please check your connection.");
                    }
                }
                None => println!("No completed subsessions in {}", summary.session_id),
            }
        }
        Command::Compare {
            patient_id,
            first,
            second,
        } => {
            if let (Some(patient_id), None, None) = (&patient_id, &first, &second) {
                for session in workflow.comparison_candidates(patient_id).await {
                    println!("{}/{}", patient_id, session.id);
                }
                return Ok(());
            }

            let first = first.as_ref().map(|r| (r.patient_id.as_str(), r.session_id.as_str()));
            let second = second.as_ref().map(|r| (r.patient_id.as_str(), r.session_id.as_str()));
            let comparison = workflow.compare(first, second).await?;
            let d = &comparison.deltas;
            println!("{} -> {} ({:?})", comparison.first.id, comparison.second.id, comparison.mode);
            println!("  Temperature      {:+.2}", d.avg_temp);
            println!("  Humidity         {:+.2}", d.avg_humidity);
            println!("  SENSOR_1 lowest  {:+.2}", d.avg_lowest_sensor1);
            println!("  SENSOR_2 highest {:+.2}", d.avg_highest_sensor2);
            println!("  Subsessions      {:+}", d.subsession_count);
        }
        Command::Export {
            patient_id,
            session,
            subsession,
            format,
        } => {
            let patient = workflow.login(&patient_id).await?.patient;
            let record = workflow.records().find_session(&patient.id, &session).await;
            let export = SessionExport::new(&patient, &session, record.as_ref());
            let details = workflow.session_details(&patient.id, &session).await;

            let path = match subsession {
                Some(subsession_id) => {
                    let detail = details
                        .iter()
                        .find(|d| d.subsession.id == subsession_id)
                        .with_context(|| format!("Subsession {} not found", subsession_id))?;
                    match format {
                        ExportFormat::Csv => {
                            writer
                                .write_subsession_csv(&export, &subsession_id, &detail.readings)
                                .await?
                        }
                        ExportFormat::Workbook => {
                            let workbook = subsession_workbook(&export, &subsession_id, &detail.readings);
                            let stem = ExportWriter::subsession_stem(&export, &subsession_id);
                            writer.write_workbook(&stem, &workbook).await?
                        }
                    }
                }
                None => {
                    let workbook = session_workbook(&export, &details);
                    writer
                        .write_workbook(&ExportWriter::session_stem(&export), &workbook)
                        .await?
                }
            };
            println!("Exported to {}", path.display());
        }
        Command::Config { action } => {
            anyhow::bail!("config {:?} is handled before the store is opened", action);
        }
    }
    Ok(())
}

async fn configure(manager: &ConfigManager, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => print!("{}", manager.to_toml().await?),
        ConfigAction::Get { key } => {
            let value: serde_json::Value = manager.get_value(key).await?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            manager.set_value(key, value).await?;
            println!("{} = {}", key, value);
        }
        ConfigAction::Save => {
            let path = manager
                .config_path()
                .context("Pass --config to choose where the configuration is saved")?;
            manager.save_config().await?;
            println!("Configuration written to {}", path);
        }
    }
    Ok(())
}

/// 运行采集；Ctrl-C 触发取消，完成后计算结果
async fn acquire_and_compute(workflow: &mut ClinicWorkflow, target: &MonitoringTarget) -> Result<()> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Stop requested by operator");
            trigger.cancel();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel::<AcquisitionProgress>();
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            if update.remaining > 0 {
                println!("{:<28} {:>2}s", update.phase.label(), update.remaining);
            }
        }
    });

    let outcome = workflow.acquire(target, cancel, Some(tx)).await;
    ctrl_c.abort();
    let _ = printer.await;

    match outcome? {
        AcquisitionOutcome::Completed { readings } => {
            println!("Acquisition complete, {} readings received", readings.len());
            compute(workflow, target).await
        }
        AcquisitionOutcome::Cancelled { discarded } => {
            println!("Acquisition stopped, discarded {:?}", discarded);
            Ok(())
        }
    }
}

async fn compute(workflow: &mut ClinicWorkflow, target: &MonitoringTarget) -> Result<()> {
    let result = workflow.compute_results(target).await?;
    if let Some(warning) = result.warning() {
        println!("{}", warning);
    }
    print_metrics("  ", &result.metrics());
    Ok(())
}

fn print_patient(patient: &Patient) {
    let info = &patient.info;
    println!(
        "{}  {}  {}y  {}  {}  {}",
        patient.id, info.name, info.age, info.sex, info.mobile, info.married
    );
}

fn print_metrics(indent: &str, metrics: &Metrics) {
    println!("{}Avg temperature      {:.2}", indent, metrics.avg_temp);
    println!("{}Avg humidity         {:.2}", indent, metrics.avg_humidity);
    println!("{}Avg lowest SENSOR_1  {:.2}", indent, metrics.avg_lowest_sensor1);
    println!("{}Avg highest SENSOR_2 {:.2}", indent, metrics.avg_highest_sensor2);
}
