use alloy::sol;

// Minimal ERC-20 surface used by the holder scanner and TVL stats
sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }
}

// Aave-style lending pool, account-level risk data
sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface ILendingPool {
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );
    }
}

// Multicall3, strict aggregate: one reverting call fails the whole trip
sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IMulticall3 {
        struct Call {
            address target;
            bytes callData;
        }

        function aggregate(Call[] calldata calls) external payable returns (uint256 blockNumber, bytes[] memory returnData);
    }
}

// Rewards controller tracking emission schedules for virtual reward tokens
sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IRewardsController {
        function getRewardsByAsset(address asset) external view returns (address[] memory);
        function getRewardsData(address asset, address reward) external view returns (uint256 index, uint256 emissionPerSecond, uint256 startTime, uint256 endTime);
    }
}
