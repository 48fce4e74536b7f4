// ==========================================
// 库存计划后端 - 命令行入口
// ==========================================
// 用法:
//   inventory-import --shop 1 --tenant 1 import skus ./skus.csv
//   inventory-import --shop 1 --tenant 1 export skus --format json
//   inventory-import --shop 1 --tenant 1 wipe
// ==========================================

use anyhow::Context;
use clap::{Parser, Subcommand};
use inventory_import::config::get_default_db_path;
use inventory_import::config::paths::DB_PATH_ENV;
use inventory_import::{logging, EntityKind, ExportFormat, ImportApi, ShopScope};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "inventory-import")]
#[command(about = "多租户库存数据导入/导出工具")]
#[command(version)]
struct Cli {
    /// SQLite 数据库路径
    #[arg(long, global = true, env = DB_PATH_ENV)]
    db: Option<String>,

    /// 店铺 ID
    #[arg(long, global = true, default_value_t = 1)]
    shop: i64,

    /// 租户 ID
    #[arg(long, global = true, default_value_t = 1)]
    tenant: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 导入实体数据（.json 按 JSON 数组处理，其余按 CSV 处理）
    Import {
        /// 实体种类，如 skus / sales_history / leftovers
        entity: EntityKind,
        /// 输入文件
        file: PathBuf,
    },
    /// 导出实体数据到 stdout
    Export {
        /// 实体种类
        entity: EntityKind,
        /// 输出格式
        #[arg(short, long, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
    },
    /// 清除店铺作用域内的全部实体数据
    Wipe,
    /// 列出支持的实体种类
    Entities,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    let scope = ShopScope::new(cli.shop, cli.tenant);

    tracing::debug!(version = inventory_import::VERSION, %db_path, %scope, "启动");

    let api = ImportApi::new(db_path);

    match cli.command {
        Commands::Import { entity, file } => {
            let file = file.to_string_lossy().to_string();
            let result = api
                .import_file(entity, scope, &file)
                .await
                .with_context(|| format!("导入 {} 失败", entity))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Export { entity, format } => {
            let output = api
                .export(entity, scope, format)
                .await
                .with_context(|| format!("导出 {} 失败", entity))?;
            print!("{}", output);
            if format == ExportFormat::Json {
                println!();
            }
        }
        Commands::Wipe => {
            let response = api.wipe_shop(scope).await.context("清除店铺数据失败")?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Entities => {
            for kind in EntityKind::ALL {
                println!("{}\t{}", kind.plural(), kind.spec().export_fields().join(","));
            }
        }
    }

    Ok(())
}
