use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use class_results::clients::PublishScope;
use class_results::models::{GradeBand, SortDirection};
use class_results::services::{
    Confirmer, FixedConfirmer, PublishOutcome, SelectionState, TerminalConfirmer,
};
use class_results::utils::{logging, truncate_text};
use class_results::workflow::{RefreshOutcome, SubmitOutcome};
use class_results::{App, Config, Granularity, PageQuery, PromotionStatus, ResultsView};

#[derive(Parser, Debug)]
#[command(name = "class-results", version, about = "班级成绩统计、计算、发布与升级决定")]
struct CliArgs {
    /// TOML 配置文件，不指定时只读取环境变量
    #[arg(long, global = true)]
    config: Option<String>,

    /// 所有确认一律回答"是"
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GranularityArg {
    Sequence,
    Term,
    Year,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Sequence => Granularity::Sequence,
            GranularityArg::Term => Granularity::Term,
            GranularityArg::Year => Granularity::Year,
        }
    }
}

#[derive(Args, Debug)]
struct PeriodArgs {
    #[arg(long, value_enum)]
    granularity: GranularityArg,
    /// 序列 / 学期 / 学年 ID
    #[arg(long)]
    period: String,
    #[arg(long)]
    class: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScopeArg {
    AllSubjects,
    AllStudents,
    Selected,
    Subject,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 查看成绩与统计
    Stats {
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
        #[arg(long, default_value = "rank")]
        sort: String,
        #[arg(long)]
        desc: bool,
    },
    /// 执行成绩计算
    Calculate {
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// 发布或取消发布
    Publish {
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long, value_enum)]
        scope: ScopeArg,
        /// scope=subject 时必填
        #[arg(long)]
        subject: Option<String>,
        /// 逗号分隔的学生 ID
        #[arg(long, value_delimiter = ',')]
        students: Vec<String>,
        /// 勾选姓名或 ID 匹配的全部学生
        #[arg(long)]
        matching: Option<String>,
        /// 取消发布
        #[arg(long)]
        unpublish: bool,
    },
    /// 升级决定
    Promotion {
        #[arg(long)]
        class: String,
        #[arg(long)]
        year: String,
        #[command(subcommand)]
        action: PromotionAction,
    },
}

#[derive(Subcommand, Debug)]
enum PromotionAction {
    /// 显示当前工作集（有草稿时显示草稿）
    Show {
        #[arg(long, default_value = "")]
        search: String,
    },
    /// 修改一名学生
    Set {
        #[arg(long)]
        student: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        remarks: Option<String>,
    },
    /// 对搜索结果批量设置状态
    Bulk {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        status: String,
    },
    /// 提交非待定的决定
    Submit,
    /// 丢弃草稿并从服务端重新加载
    Discard,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // 加载配置
    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("加载配置失败: {}", path))?,
        None => Config::from_env(),
    };
    config.verbose_logging |= args.verbose;

    // 初始化日志
    logging::init(config.verbose_logging);

    let confirmer: Arc<dyn Confirmer> = if args.yes {
        Arc::new(FixedConfirmer::new(true))
    } else {
        Arc::new(TerminalConfirmer)
    };
    let mut app = App::initialize(config, confirmer).context("初始化失败")?;

    match args.command {
        Commands::Stats {
            period,
            page,
            page_size,
            sort,
            desc,
        } => {
            let engine = app.engine(period.granularity.into());
            let key = engine.key(&period.period, &period.class);
            let direction = if desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            let query = PageQuery::new(page, page_size.unwrap_or(app.config().default_page_size))
                .sorted_by(sort, direction);
            let view = engine.load_view(&key, &query).await?;
            print_view(&view);
        }
        Commands::Calculate { period } => {
            let engine = app.engine(period.granularity.into());
            let key = engine.key(&period.period, &period.class);
            let views = engine.calculate(&key).await?;
            println!("计算完成，共 {} 名学生", views.full.results.len());
        }
        Commands::Publish {
            period,
            scope,
            subject,
            students,
            matching,
            unpublish,
        } => {
            let scope = match scope {
                ScopeArg::AllSubjects => PublishScope::AllSubjects,
                ScopeArg::AllStudents => PublishScope::AllStudents,
                ScopeArg::Selected => PublishScope::SelectedStudents,
                ScopeArg::Subject => PublishScope::SubjectForSelected {
                    subject_id: subject.ok_or_else(|| anyhow!("--scope subject 需要 --subject"))?,
                },
            };
            let engine = app.engine(period.granularity.into());
            let key = engine.key(&period.period, &period.class);
            let mut selection = SelectionState::new();
            for id in &students {
                selection.toggle(id);
            }
            if let Some(search) = matching {
                let results = engine.full_results(&key).await?;
                selection.set_search(search);
                selection.select_all_filtered(&results);
            }
            let outcome = engine
                .publish_selection(&key, &scope, !unpublish, &mut selection)
                .await?;
            match outcome {
                PublishOutcome::Applied { updated } => {
                    println!("完成 (更新: {})", updated.map_or("-".to_string(), |n| n.to_string()))
                }
                PublishOutcome::Skipped => println!("未选择学生，未发送请求"),
            }
        }
        Commands::Promotion {
            class,
            year,
            action,
        } => run_promotion(&mut app, &class, &year, action).await?,
    }

    Ok(())
}

async fn run_promotion(app: &mut App, class: &str, year: &str, action: PromotionAction) -> Result<()> {
    let store = app.promotions();
    store.open(class, year).await?;

    match action {
        PromotionAction::Show { search } => {
            let session = store
                .session()
                .ok_or_else(|| anyhow!("草稿会话未打开"))?;
            println!(
                "班级 {} 学年 {}{}",
                class,
                year,
                if session.is_draft_active() { " (本地草稿)" } else { "" }
            );
            for entry in session.filtered(&search) {
                println!(
                    "{}{:<12} {:<24} {:<12} {}",
                    if entry.is_changed() { "*" } else { " " },
                    entry.matricule,
                    truncate_text(&entry.full_name, 24),
                    entry.promotion_status,
                    entry.remarks
                );
            }
            let summary = session.summary();
            println!(
                "待定 {} / 升级 {} / 有条件 {} / 留级 {} / 毕业 {}",
                summary.pending,
                summary.promoted,
                summary.conditional,
                summary.repeated,
                summary.graduated
            );
        }
        PromotionAction::Set {
            student,
            status,
            remarks,
        } => {
            if let Some(status) = status {
                store.set_status(&student, parse_status(&status)?)?;
            }
            if let Some(remarks) = remarks {
                store.set_remarks(&student, &remarks)?;
            }
            info!("草稿已保存");
        }
        PromotionAction::Bulk { search, status } => {
            let changed = store.bulk_set_status(&search, parse_status(&status)?)?;
            println!("已修改 {} 名学生", changed);
        }
        PromotionAction::Submit => match store.submit().await? {
            SubmitOutcome::Submitted {
                submitted, pending, ..
            } => println!("已提交 {} 条，仍待定 {} 名", submitted, pending),
            SubmitOutcome::Cancelled => println!("已取消"),
        },
        PromotionAction::Discard => match store.refresh().await? {
            RefreshOutcome::Reloaded => println!("已从服务端重新加载"),
            RefreshOutcome::Cancelled => println!("已取消"),
        },
    }
    Ok(())
}

fn parse_status(value: &str) -> Result<PromotionStatus> {
    PromotionStatus::from_str(value).ok_or_else(|| anyhow!("未知的升级状态: {}", value))
}

fn print_view(view: &ResultsView) {
    let stats = &view.statistics;
    println!(
        "{} | 第 {} 条 | 班级平均 {:.2} | 最高 {:.2} | 最低 {:.2} | 及格率 {:.1}%",
        view.page.class_name,
        view.page.count,
        stats.class_average,
        stats.highest_average,
        stats.lowest_average,
        stats.pass_rate()
    );
    if let Some(exists) = view.results_exist {
        println!("已有成绩: {}", if exists { "是" } else { "否" });
    }
    for band in GradeBand::ALL {
        println!(
            "  {:<6} {:>3} ({:.1}%)",
            band.name(),
            stats.distribution.count(band),
            stats.distribution.percentage_of(band, stats.total_students)
        );
    }
    println!("成绩:");
    for result in &view.page.results {
        println!(
            "  {:>4} {:<24} {:>6.2} {}",
            result.rank.map_or("-".to_string(), |r| r.to_string()),
            truncate_text(&result.student_name, 24),
            result.average,
            if result.is_published { "已发布" } else { "" }
        );
    }
    println!("前三名:");
    for result in &view.top_students {
        println!("  {:<24} {:.2}", result.student_name, result.average);
    }
    println!("后三名:");
    for result in &view.worst_students {
        println!("  {:<24} {:.2}", result.student_name, result.average);
    }
}
