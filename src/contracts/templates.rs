//! Contract templates and placeholder substitution.

use alloy::primitives::{Address, U256};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::{AgentError, AgentResult};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(\w+)\s*\}\}").unwrap_or_else(|e| panic!("invalid placeholder pattern: {}", e))
});

/// Accepted shape of a template value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Inserted inside a Solidity string literal.
    String,
    /// Inserted as a checksummed address literal.
    Address,
    /// Inserted as a decimal integer literal.
    Uint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateParameter {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source: String,
    pub parameters: Vec<TemplateParameter>,
}

/// Source of deployable templates.
pub trait TemplateStore: Send + Sync {
    fn template(&self, id: &str) -> Option<ContractTemplate>;

    /// All templates, ordered by id.
    fn list(&self) -> Vec<ContractTemplate>;
}

/// Substitute `{{placeholder}}` tokens in the template source.
///
/// Missing values fall back to the parameter default. Every value is checked
/// against its declared kind before it reaches the source.
pub fn instantiate(template: &ContractTemplate, values: &HashMap<String, String>) -> AgentResult<String> {
    let mut rendered: HashMap<&str, String> = HashMap::with_capacity(template.parameters.len());
    for param in &template.parameters {
        let raw = values
            .get(&param.name)
            .or(param.default.as_ref())
            .ok_or_else(|| {
                AgentError::Validation(format!("Missing template parameter: {}", param.name))
            })?;
        rendered.insert(param.name.as_str(), render_value(param, raw)?);
    }

    if let Some(unknown) = PLACEHOLDER
        .captures_iter(&template.source)
        .filter_map(|c| c.get(1))
        .find(|name| !rendered.contains_key(name.as_str()))
    {
        return Err(AgentError::Validation(format!(
            "Unresolved template placeholder: {}",
            unknown.as_str()
        )));
    }

    let source = PLACEHOLDER.replace_all(&template.source, |caps: &regex::Captures<'_>| {
        rendered.get(&caps[1]).cloned().unwrap_or_default()
    });
    Ok(source.into_owned())
}

fn render_value(param: &TemplateParameter, raw: &str) -> AgentResult<String> {
    let value = raw.trim();
    let invalid = |reason: &str| {
        AgentError::Validation(format!("Invalid value for {}: {}", param.name, reason))
    };

    match param.kind {
        ParamKind::String => {
            if value.is_empty() {
                return Err(invalid("must not be empty"));
            }
            if value.chars().any(|c| c == '"' || c == '\\' || c.is_control()) {
                return Err(invalid("quotes, backslashes and control characters are not allowed"));
            }
            Ok(value.to_string())
        }
        ParamKind::Address => value
            .parse::<Address>()
            .map(|a| a.to_checksum(None))
            .map_err(|_| invalid("expected a 0x-prefixed 20-byte address")),
        ParamKind::Uint => {
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid("expected a non-negative integer"));
            }
            U256::from_str_radix(value, 10)
                .map(|v| v.to_string())
                .map_err(|_| invalid("exceeds uint256"))
        }
    }
}

/// Templates compiled into the binary.
#[derive(Debug, Clone)]
pub struct BuiltinTemplates {
    templates: Vec<ContractTemplate>,
}

impl Default for BuiltinTemplates {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinTemplates {
    pub fn new() -> Self {
        let param = |name: &str, kind, description: &str, default: Option<&str>| TemplateParameter {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            default: default.map(str::to_string),
        };

        let mut templates = vec![
            ContractTemplate {
                id: "erc20-token".to_string(),
                name: "ERC-20 Token".to_string(),
                description: "Fungible token with owner-restricted minting".to_string(),
                source: ERC20_SOURCE.to_string(),
                parameters: vec![
                    param("name", ParamKind::String, "Token name", None),
                    param("symbol", ParamKind::String, "Token symbol", None),
                    param("initialSupply", ParamKind::Uint, "Whole tokens minted to the owner", Some("0")),
                    param("owner", ParamKind::Address, "Initial owner and minter", None),
                ],
            },
            ContractTemplate {
                id: "simple-storage".to_string(),
                name: "Simple Storage".to_string(),
                description: "Stores a single unsigned integer".to_string(),
                source: SIMPLE_STORAGE_SOURCE.to_string(),
                parameters: vec![param(
                    "initialValue",
                    ParamKind::Uint,
                    "Value stored at deployment",
                    Some("0"),
                )],
            },
            ContractTemplate {
                id: "erc721-nft".to_string(),
                name: "ERC-721 Collection".to_string(),
                description: "Non-fungible token collection with owner-restricted minting".to_string(),
                source: ERC721_SOURCE.to_string(),
                parameters: vec![
                    param("name", ParamKind::String, "Collection name", None),
                    param("symbol", ParamKind::String, "Collection symbol", None),
                    param("owner", ParamKind::Address, "Collection owner and minter", None),
                ],
            },
        ];
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        Self { templates }
    }
}

impl TemplateStore for BuiltinTemplates {
    fn template(&self, id: &str) -> Option<ContractTemplate> {
        self.templates.iter().find(|t| t.id == id).cloned()
    }

    fn list(&self) -> Vec<ContractTemplate> {
        self.templates.clone()
    }
}

const ERC20_SOURCE: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

contract Token {
    string public name = "{{name}}";
    string public symbol = "{{symbol}}";
    uint8 public constant decimals = 18;
    uint256 public totalSupply;
    address public owner;

    mapping(address => uint256) public balanceOf;
    mapping(address => mapping(address => uint256)) public allowance;

    event Transfer(address indexed from, address indexed to, uint256 value);
    event Approval(address indexed holder, address indexed spender, uint256 value);

    modifier onlyOwner() {
        require(msg.sender == owner, "not owner");
        _;
    }

    constructor() {
        owner = {{owner}};
        _mint({{owner}}, {{initialSupply}} * 10 ** uint256(decimals));
    }

    function transfer(address to, uint256 amount) external returns (bool) {
        _transfer(msg.sender, to, amount);
        return true;
    }

    function approve(address spender, uint256 amount) external returns (bool) {
        allowance[msg.sender][spender] = amount;
        emit Approval(msg.sender, spender, amount);
        return true;
    }

    function transferFrom(address from, address to, uint256 amount) external returns (bool) {
        uint256 allowed = allowance[from][msg.sender];
        require(allowed >= amount, "allowance exceeded");
        allowance[from][msg.sender] = allowed - amount;
        _transfer(from, to, amount);
        return true;
    }

    function mint(address to, uint256 amount) external onlyOwner {
        _mint(to, amount);
    }

    function _transfer(address from, address to, uint256 amount) internal {
        require(to != address(0), "zero address");
        require(balanceOf[from] >= amount, "insufficient balance");
        balanceOf[from] -= amount;
        balanceOf[to] += amount;
        emit Transfer(from, to, amount);
    }

    function _mint(address to, uint256 amount) internal {
        require(to != address(0), "zero address");
        totalSupply += amount;
        balanceOf[to] += amount;
        emit Transfer(address(0), to, amount);
    }
}
"#;

const SIMPLE_STORAGE_SOURCE: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

contract SimpleStorage {
    uint256 private storedValue;
    address public owner;

    event ValueChanged(uint256 previous, uint256 current);

    constructor() {
        storedValue = {{initialValue}};
        owner = msg.sender;
    }

    function set(uint256 value) external {
        uint256 previous = storedValue;
        storedValue = value;
        emit ValueChanged(previous, value);
    }

    function get() external view returns (uint256) {
        return storedValue;
    }
}
"#;

const ERC721_SOURCE: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

contract Collection {
    string public name = "{{name}}";
    string public symbol = "{{symbol}}";
    address public owner;
    uint256 public nextTokenId;

    mapping(uint256 => address) private owners;
    mapping(address => uint256) private balances;
    mapping(uint256 => address) public getApproved;

    event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    event Approval(address indexed holder, address indexed approved, uint256 indexed tokenId);

    modifier onlyOwner() {
        require(msg.sender == owner, "not owner");
        _;
    }

    constructor() {
        owner = {{owner}};
    }

    function balanceOf(address account) external view returns (uint256) {
        require(account != address(0), "zero address");
        return balances[account];
    }

    function ownerOf(uint256 tokenId) public view returns (address) {
        address holder = owners[tokenId];
        require(holder != address(0), "nonexistent token");
        return holder;
    }

    function approve(address to, uint256 tokenId) external {
        address holder = ownerOf(tokenId);
        require(msg.sender == holder, "not token owner");
        getApproved[tokenId] = to;
        emit Approval(holder, to, tokenId);
    }

    function transferFrom(address from, address to, uint256 tokenId) external {
        require(ownerOf(tokenId) == from, "wrong owner");
        require(msg.sender == from || msg.sender == getApproved[tokenId], "not authorized");
        require(to != address(0), "zero address");
        delete getApproved[tokenId];
        balances[from] -= 1;
        balances[to] += 1;
        owners[tokenId] = to;
        emit Transfer(from, to, tokenId);
    }

    function mint(address to) external onlyOwner returns (uint256 tokenId) {
        require(to != address(0), "zero address");
        tokenId = nextTokenId++;
        balances[to] += 1;
        owners[tokenId] = to;
        emit Transfer(address(0), to, tokenId);
    }
}
"#;
