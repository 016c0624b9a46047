// ==========================================
// 销售台账 - 领域类型定义
// ==========================================
// 职责: 学期/达成状态/导入状态等枚举
// 序列化格式: 与数据库字符串一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 学期 (Semester)
// ==========================================
// 1 = 1-6 月, 2 = 7-12 月
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Semester {
    First,
    Second,
}

impl Semester {
    /// 根据月份 (1-12) 判定所属学期
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            1..=6 => Some(Semester::First),
            7..=12 => Some(Semester::Second),
            _ => None,
        }
    }

    /// 根据数字 (1/2) 解析学期
    pub fn from_number(value: i64) -> Option<Self> {
        match value {
            1 => Some(Semester::First),
            2 => Some(Semester::Second),
            _ => None,
        }
    }

    pub fn number(self) -> i32 {
        match self {
            Semester::First => 1,
            Semester::Second => 2,
        }
    }

    /// 学期覆盖的 6 个月份
    pub fn months(self) -> std::ops::RangeInclusive<u32> {
        match self {
            Semester::First => 1..=6,
            Semester::Second => 7..=12,
        }
    }

    pub fn contains_month(self, month: u32) -> bool {
        self.months().contains(&month)
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// 月份英文缩写 (Jan..Dec)
pub fn month_label(month: u32) -> Option<&'static str> {
    const LABELS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    if (1..=12).contains(&month) {
        Some(LABELS[(month - 1) as usize])
    } else {
        None
    }
}

// ==========================================
// 达成状态 (Achievement Status)
// ==========================================
// >= 100 → on-target; [80, 100) → at-risk; < 80 → off-target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AchievementStatus {
    OnTarget,
    AtRisk,
    OffTarget,
}

impl fmt::Display for AchievementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AchievementStatus::OnTarget => write!(f, "on-target"),
            AchievementStatus::AtRisk => write!(f, "at-risk"),
            AchievementStatus::OffTarget => write!(f, "off-target"),
        }
    }
}

// ==========================================
// 无键行策略 (Unkeyed Row Policy)
// ==========================================
// 单据号或行号缺失的行如何处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnkeyedRowPolicy {
    Reject,      // 跳过并计数（默认）
    AlwaysNew,   // 始终视为新行（与源系统一致）
    ContentHash, // 按整行内容指纹去重
}

impl fmt::Display for UnkeyedRowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnkeyedRowPolicy::Reject => write!(f, "REJECT"),
            UnkeyedRowPolicy::AlwaysNew => write!(f, "ALWAYS_NEW"),
            UnkeyedRowPolicy::ContentHash => write!(f, "CONTENT_HASH"),
        }
    }
}

impl FromStr for UnkeyedRowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "REJECT" => Ok(UnkeyedRowPolicy::Reject),
            "ALWAYS_NEW" => Ok(UnkeyedRowPolicy::AlwaysNew),
            "CONTENT_HASH" => Ok(UnkeyedRowPolicy::ContentHash),
            other => Err(format!("未知的无键行策略: {}", other)),
        }
    }
}

// ==========================================
// 导入状态 (Import Status)
// ==========================================
// 对外响应中的 status 字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Success, // 有新行落库
    Info,    // 无新数据
    Error,   // 批次被阻断
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStatus::Success => write!(f, "success"),
            ImportStatus::Info => write!(f, "info"),
            ImportStatus::Error => write!(f, "error"),
        }
    }
}

// ==========================================
// 批次类型 (Batch Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchKind {
    Sales,  // 销售明细
    Cost,   // 成本主数据
    Target, // 销售目标
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Sales => write!(f, "SALES"),
            BatchKind::Cost => write!(f, "COST"),
            BatchKind::Target => write!(f, "TARGET"),
        }
    }
}

impl FromStr for BatchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SALES" => Ok(BatchKind::Sales),
            "COST" => Ok(BatchKind::Cost),
            "TARGET" => Ok(BatchKind::Target),
            other => Err(format!("未知的批次类型: {}", other)),
        }
    }
}

// ==========================================
// 行问题级别 (Row Issue Level)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowIssueLevel {
    Error,   // 行被跳过
    Warning, // 行保留，字段置空
    Info,    // 仅记录
}

// ==========================================
// 汇总粒度 (Performance Grain)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceGrain {
    Month,
    Semester,
    Year,
}
