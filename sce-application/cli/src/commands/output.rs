//! CLI 通用输出格式化模块
//!
//! 提供 table/json 两种输出格式的通用实现

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Table,
    Json,
}

impl Format {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "table" => Ok(Format::Table),
            "json" => Ok(Format::Json),
            other => bail!("不支持的输出格式: {} (可选 table/json)", other),
        }
    }
}

/// 可输出为表格行的数据 trait
pub trait TableRow {
    /// 返回表格列标题
    fn headers() -> Vec<&'static str>;

    /// 返回该项的表格行数据
    fn row(&self) -> Vec<String>;
}

/// 表格格式输出
pub fn print_table<T: TableRow>(items: &[T]) {
    let headers = T::headers();

    // 打印表头
    let header_line: String = headers
        .iter()
        .map(|h| format!("{:<20}", h))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", header_line);
    println!("{}", "-".repeat(header_line.len()));

    // 打印数据行
    for item in items {
        let row_line: String = item
            .row()
            .iter()
            .map(|c| format!("{:<20}", c))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}", row_line);
    }
}

/// JSON 格式输出
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 根据格式参数选择列表输出方式
pub fn output_list<T: TableRow + Serialize>(items: &[T], format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(items)?,
        Format::Table => {
            print_table(items);
            println!("\n共 {} 项", items.len());
        }
    }
    Ok(())
}

/// 单个资源输出，表格格式下按“列名: 值”逐行显示
pub fn output_one<T: TableRow + Serialize>(item: &T, format: Format) -> Result<()> {
    match format {
        Format::Json => print_json(item)?,
        Format::Table => {
            for (header, value) in T::headers().into_iter().zip(item.row()) {
                println!("{:<12} {}", format!("{}:", header), value);
            }
        }
    }
    Ok(())
}

/// 可选字段显示为 `-`
pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

pub fn format_time(time: Option<&DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
